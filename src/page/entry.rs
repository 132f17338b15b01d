use serde::{Deserialize, Serialize};

use crate::metrics::MetricKind;

/// One entry reported by a page's performance timeline. Times are milliseconds
/// relative to navigation start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PerformanceEntry {
    #[serde(rename_all = "camelCase")]
    LargestContentfulPaint { start_time: f64 },
    #[serde(rename_all = "camelCase")]
    LayoutShift {
        start_time: f64,
        value: f64,
        #[serde(default)]
        had_recent_input: bool,
    },
    #[serde(rename_all = "camelCase")]
    Event {
        start_time: f64,
        duration: f64,
        /// Zero or absent for events that are not part of a user interaction.
        #[serde(default)]
        interaction_id: Option<u64>,
    },
}

impl PerformanceEntry {
    pub fn kind(&self) -> MetricKind {
        match self {
            PerformanceEntry::LargestContentfulPaint { .. } => MetricKind::PaintTiming,
            PerformanceEntry::LayoutShift { .. } => MetricKind::LayoutStability,
            PerformanceEntry::Event { .. } => MetricKind::InteractionLatency,
        }
    }

    pub fn start_time(&self) -> f64 {
        match self {
            PerformanceEntry::LargestContentfulPaint { start_time }
            | PerformanceEntry::LayoutShift { start_time, .. }
            | PerformanceEntry::Event { start_time, .. } => *start_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    pub request_start: f64,
    pub response_start: f64,
    pub dom_content_loaded_event_end: f64,
    pub load_event_end: f64,
}

impl NavigationTiming {
    pub fn ttfb_ms(&self) -> f64 {
        (self.response_start - self.request_start).max(0.0)
    }

    pub fn dom_load_ms(&self) -> f64 {
        (self.dom_content_loaded_event_end - self.request_start).max(0.0)
    }

    pub fn window_load_ms(&self) -> f64 {
        (self.load_event_end - self.request_start).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default)]
    pub initiator_type: String,
    #[serde(default)]
    pub transfer_size: Option<u64>,
    #[serde(default)]
    pub duration: f64,
}

impl ResourceEntry {
    pub fn is_script(&self) -> bool {
        let path = self.name.split(['?', '#']).next().unwrap_or_default();
        path.ends_with(".js")
            || path.ends_with(".jsx")
            || path.ends_with(".mjs")
            || self.initiator_type == "script"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterMode {
    App,
    Pages,
    #[default]
    Unknown,
}

/// Outcome of framework and structure detection, reported by the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageFeatures {
    pub is_target_framework: bool,
    pub router: RouterMode,
    pub build_id: Option<String>,
    pub image_optimization: bool,
    pub font_optimization: bool,
    pub i18n: bool,
    /// `<img>` elements not served through the framework's image pipeline.
    pub unoptimized_images: usize,
    pub meta_tags: usize,
    pub open_graph_tags: usize,
    pub structured_data: usize,
    pub language: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_deserializes_from_timeline_shape() {
        let entry: PerformanceEntry = serde_json::from_str(
            r#"{"type":"layout-shift","startTime":120.0,"value":0.04,"hadRecentInput":true}"#,
        )
        .unwrap();

        assert_eq!(entry.kind(), MetricKind::LayoutStability);
        assert_eq!(
            entry,
            PerformanceEntry::LayoutShift {
                start_time: 120.0,
                value: 0.04,
                had_recent_input: true
            }
        );
    }

    #[test]
    fn test_script_detection_ignores_query_string() {
        let bundle = ResourceEntry {
            name: "https://example.com/_next/static/chunks/main.js?v=3".into(),
            initiator_type: "link".into(),
            transfer_size: Some(1024),
            duration: 10.0,
        };
        let image = ResourceEntry {
            name: "https://example.com/hero.png".into(),
            initiator_type: "img".into(),
            transfer_size: Some(4096),
            duration: 10.0,
        };
        let injected = ResourceEntry {
            name: "https://cdn.example.com/loader".into(),
            initiator_type: "script".into(),
            transfer_size: None,
            duration: 10.0,
        };

        assert!(bundle.is_script());
        assert!(!image.is_script());
        assert!(injected.is_script());
    }

    #[test]
    fn test_navigation_timing_derivations() {
        let timing = NavigationTiming {
            request_start: 100.0,
            response_start: 350.0,
            dom_content_loaded_event_end: 1300.0,
            load_event_end: 2100.0,
        };

        assert_eq!(timing.ttfb_ms(), 250.0);
        assert_eq!(timing.dom_load_ms(), 1200.0);
        assert_eq!(timing.window_load_ms(), 2000.0);
    }
}
