use std::fmt;

use serde::{Deserialize, Serialize};

use crate::page::ResourceEntry;

/// Resources slower than this count towards `slow_count`.
const SLOW_RESOURCE_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricKind {
    PaintTiming,
    LayoutStability,
    InteractionLatency,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::PaintTiming => "paint timing",
            MetricKind::LayoutStability => "layout stability",
            MetricKind::InteractionLatency => "interaction latency",
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            MetricKind::PaintTiming => Unit::Seconds,
            MetricKind::LayoutStability => Unit::Score,
            MetricKind::InteractionLatency => Unit::Milliseconds,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Unit {
    Seconds,
    Milliseconds,
    /// Dimensionless layout-shift score.
    Score,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    Measured,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub kind: MetricKind,
    pub value: f64,
    pub unit: Unit,
    pub confidence: Confidence,
}

impl MetricSample {
    pub fn new(kind: MetricKind, value: f64, confidence: Confidence) -> Self {
        Self {
            kind,
            value,
            unit: kind.unit(),
            confidence,
        }
    }

    /// Value on the scale the scoring thresholds use: milliseconds for time
    /// metrics, the raw score otherwise.
    pub fn scoring_value(&self) -> f64 {
        match self.unit {
            Unit::Seconds => self.value * 1000.0,
            Unit::Milliseconds | Unit::Score => self.value,
        }
    }

    pub fn is_measured(&self) -> bool {
        self.confidence == Confidence::Measured
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSummary {
    pub total_bytes: u64,
    pub script_bytes: u64,
    pub resource_count: usize,
    pub script_count: usize,
    pub slow_count: usize,
}

impl ResourceSummary {
    pub fn from_entries(entries: &[ResourceEntry]) -> Self {
        let mut summary = Self {
            resource_count: entries.len(),
            ..Self::default()
        };

        for entry in entries {
            let bytes = entry.transfer_size.unwrap_or(0);
            summary.total_bytes = summary.total_bytes.saturating_add(bytes);

            if entry.is_script() {
                summary.script_count += 1;
                summary.script_bytes = summary.script_bytes.saturating_add(bytes);
            }

            if entry.duration > SLOW_RESOURCE_MS {
                summary.slow_count += 1;
            }
        }

        summary
    }

    pub fn total_kb(&self) -> f64 {
        self.total_bytes as f64 / 1024.0
    }

    pub fn script_kb(&self) -> f64 {
        self.script_bytes as f64 / 1024.0
    }

    /// Share of transferred kilobytes that are script. Zero-byte pages divide by one.
    pub fn script_byte_ratio(&self) -> f64 {
        let total_kb = self.total_kb();
        let denominator = if total_kb > 0.0 { total_kb } else { 1.0 };
        self.script_kb() / denominator
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBundle {
    pub paint_timing: MetricSample,
    pub layout_stability: MetricSample,
    pub interaction_latency: MetricSample,
    pub time_to_first_byte_ms: Option<f64>,
    pub resources: ResourceSummary,
}

impl MetricsBundle {
    pub fn samples(&self) -> [&MetricSample; 3] {
        [
            &self.paint_timing,
            &self.layout_stability,
            &self.interaction_latency,
        ]
    }

    pub fn script_byte_ratio(&self) -> f64 {
        self.resources.script_byte_ratio()
    }

    pub fn fallback_count(&self) -> usize {
        self.samples().iter().filter(|s| !s.is_measured()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str, initiator: &str, bytes: u64, duration: f64) -> ResourceEntry {
        ResourceEntry {
            name: name.into(),
            initiator_type: initiator.into(),
            transfer_size: Some(bytes),
            duration,
        }
    }

    #[test]
    fn test_resource_summary_splits_script_bytes() {
        let summary = ResourceSummary::from_entries(&[
            resource("/app.js", "script", 300 * 1024, 200.0),
            resource("/vendor.js", "script", 100 * 1024, 1500.0),
            resource("/hero.jpg", "img", 600 * 1024, 900.0),
        ]);

        assert_eq!(summary.resource_count, 3);
        assert_eq!(summary.script_count, 2);
        assert_eq!(summary.script_bytes, 400 * 1024);
        assert_eq!(summary.total_bytes, 1000 * 1024);
        assert_eq!(summary.slow_count, 1);
        assert!((summary.script_byte_ratio() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_page_ratio_is_zero() {
        let summary = ResourceSummary::from_entries(&[]);
        assert_eq!(summary.script_byte_ratio(), 0.0);
    }

    #[test]
    fn test_paint_sample_scores_in_milliseconds() {
        let sample = MetricSample::new(MetricKind::PaintTiming, 1.8, Confidence::Measured);
        assert_eq!(sample.unit, Unit::Seconds);
        assert!((sample.scoring_value() - 1800.0).abs() < 1e-9);
    }
}
