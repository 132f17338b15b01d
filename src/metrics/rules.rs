use crate::config::CollectionConfig;
use crate::page::{NavigationTiming, PerformanceEntry};

use super::types::{Confidence, MetricKind};

/// Metric-specific half of a collector: what to accumulate and when to stop.
pub trait MetricRule: Send {
    const KIND: MetricKind;

    /// Record one entry. `Some(value)` resolves the collector.
    fn record(&mut self, entry: &PerformanceEntry, loaded: bool) -> Option<f64>;

    /// The document just finished loading.
    fn load_completed(&mut self) -> Option<f64>;

    /// Value reported when the timeout (or the aggregator ceiling) fires first.
    fn expire(&self, timing: Option<&NavigationTiming>) -> (f64, Confidence);

    /// Value reported when the page cannot be observed at all.
    fn fallback(&self, timing: Option<&NavigationTiming>) -> f64;
}

/// Largest visible content paint, in seconds.
#[derive(Debug, Clone)]
pub struct PaintRule {
    render_margin_ms: f64,
    default_ms: f64,
    largest_start_ms: Option<f64>,
}

impl PaintRule {
    pub fn new(config: &CollectionConfig) -> Self {
        Self {
            render_margin_ms: config.paint_render_margin_ms,
            default_ms: config.paint_default_ms,
            largest_start_ms: None,
        }
    }

    fn seconds(&self) -> Option<f64> {
        self.largest_start_ms.map(|ms| ms / 1000.0)
    }
}

impl MetricRule for PaintRule {
    const KIND: MetricKind = MetricKind::PaintTiming;

    fn record(&mut self, entry: &PerformanceEntry, loaded: bool) -> Option<f64> {
        let PerformanceEntry::LargestContentfulPaint { start_time } = entry else {
            return None;
        };
        let largest = self.largest_start_ms.map_or(*start_time, |prev| prev.max(*start_time));
        self.largest_start_ms = Some(largest);

        if loaded {
            self.seconds()
        } else {
            None
        }
    }

    fn load_completed(&mut self) -> Option<f64> {
        self.seconds()
    }

    fn expire(&self, timing: Option<&NavigationTiming>) -> (f64, Confidence) {
        match self.seconds() {
            Some(seconds) => (seconds, Confidence::Measured),
            None => (self.fallback(timing), Confidence::Fallback),
        }
    }

    fn fallback(&self, timing: Option<&NavigationTiming>) -> f64 {
        let ms = timing
            .map(|t| t.dom_load_ms() + self.render_margin_ms)
            .unwrap_or(self.default_ms);
        ms / 1000.0
    }
}

/// Largest session window of unexpected layout shifts.
#[derive(Debug, Clone)]
pub struct LayoutShiftRule {
    window_gap_ms: f64,
    fallback: f64,
    window_start_ms: Option<f64>,
    window_sum: f64,
    largest_window: f64,
    shifts_seen: usize,
}

impl LayoutShiftRule {
    pub fn new(config: &CollectionConfig) -> Self {
        Self {
            window_gap_ms: config.layout_window_gap_ms,
            fallback: config.layout_fallback,
            window_start_ms: None,
            window_sum: 0.0,
            largest_window: 0.0,
            shifts_seen: 0,
        }
    }

    pub fn value(&self) -> f64 {
        self.largest_window
    }

    fn push(&mut self, start_time: f64, value: f64) {
        let opens_window = match self.window_start_ms {
            None => true,
            Some(window_start) => {
                start_time < window_start || start_time - window_start > self.window_gap_ms
            }
        };

        if opens_window {
            self.window_start_ms = Some(start_time);
            self.window_sum = value;
        } else {
            self.window_sum += value;
        }

        self.largest_window = self.largest_window.max(self.window_sum);
        self.shifts_seen += 1;
    }
}

impl MetricRule for LayoutShiftRule {
    const KIND: MetricKind = MetricKind::LayoutStability;

    fn record(&mut self, entry: &PerformanceEntry, _loaded: bool) -> Option<f64> {
        if let PerformanceEntry::LayoutShift {
            start_time,
            value,
            had_recent_input: false,
        } = entry
        {
            self.push(*start_time, *value);
        }
        // Shifts keep arriving for the whole page lifetime; only the timer ends this one.
        None
    }

    fn load_completed(&mut self) -> Option<f64> {
        None
    }

    fn expire(&self, _timing: Option<&NavigationTiming>) -> (f64, Confidence) {
        if self.shifts_seen == 0 {
            (self.fallback, Confidence::Fallback)
        } else {
            (self.largest_window, Confidence::Measured)
        }
    }

    fn fallback(&self, _timing: Option<&NavigationTiming>) -> f64 {
        self.fallback
    }
}

/// 98th-percentile interaction duration, in milliseconds.
#[derive(Debug, Clone)]
pub struct InteractionRule {
    fallback_ms: f64,
    floor_ms: f64,
    min_interactions: usize,
    durations: Vec<f64>,
    loaded: bool,
}

impl InteractionRule {
    pub fn new(config: &CollectionConfig) -> Self {
        Self {
            fallback_ms: config.interaction_fallback_ms,
            floor_ms: config.interaction_floor_ms,
            min_interactions: config.min_interactions,
            durations: Vec::new(),
            loaded: false,
        }
    }

    /// Duration at `floor(0.02 * n)` of the descending order, clamped to the last index.
    pub fn percentile(&self) -> Option<f64> {
        if self.durations.is_empty() {
            return None;
        }
        let mut sorted = self.durations.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let index = ((sorted.len() as f64 * 0.02).floor() as usize).min(sorted.len() - 1);
        Some(sorted[index])
    }

    fn ready(&self) -> Option<f64> {
        if self.loaded && self.durations.len() >= self.min_interactions {
            self.percentile().map(|value| value.max(self.floor_ms))
        } else {
            None
        }
    }
}

impl MetricRule for InteractionRule {
    const KIND: MetricKind = MetricKind::InteractionLatency;

    fn record(&mut self, entry: &PerformanceEntry, loaded: bool) -> Option<f64> {
        self.loaded |= loaded;
        match entry {
            PerformanceEntry::Event {
                duration,
                interaction_id: Some(id),
                ..
            } if *id != 0 => {
                self.durations.push(*duration);
                self.ready()
            }
            _ => None,
        }
    }

    fn load_completed(&mut self) -> Option<f64> {
        self.loaded = true;
        self.ready()
    }

    fn expire(&self, _timing: Option<&NavigationTiming>) -> (f64, Confidence) {
        // Too few interactions to trust: never report below the fallback.
        let partial = self.percentile().unwrap_or(0.0);
        (partial.max(self.fallback_ms), Confidence::Fallback)
    }

    fn fallback(&self, _timing: Option<&NavigationTiming>) -> f64 {
        self.fallback_ms
    }
}
