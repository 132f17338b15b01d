use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::scoring::ScoringConfig;

const LAYOUT_TIMEOUT_RANGE_MS: (u64, u64) = (2_000, 5_000);
const INTERACTION_TIMEOUT_RANGE_MS: (u64, u64) = (2_000, 8_000);

/// Collector timeouts and fallback constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionConfig {
    pub paint_timeout_ms: u64,
    pub layout_timeout_ms: u64,
    pub interaction_timeout_ms: u64,
    /// Aggregator ceiling; pending collectors fall back once it elapses.
    pub ceiling_ms: u64,

    pub paint_render_margin_ms: f64,
    pub paint_default_ms: f64,

    /// A shift more than this far past the window start opens a new window.
    pub layout_window_gap_ms: f64,
    /// Reported when no shift was observed; never 0.
    pub layout_fallback: f64,

    pub interaction_fallback_ms: f64,
    pub interaction_floor_ms: f64,
    pub min_interactions: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            paint_timeout_ms: 5_000,
            layout_timeout_ms: 2_000,
            interaction_timeout_ms: 2_000,
            ceiling_ms: 8_000,
            paint_render_margin_ms: 200.0,
            paint_default_ms: 3_000.0,
            layout_window_gap_ms: 5_000.0,
            layout_fallback: 0.05,
            interaction_fallback_ms: 200.0,
            interaction_floor_ms: 100.0,
            min_interactions: 5,
        }
    }
}

impl CollectionConfig {
    pub fn paint_timeout(&self) -> Duration {
        Duration::from_millis(self.paint_timeout_ms)
    }

    pub fn layout_timeout(&self) -> Duration {
        Duration::from_millis(self.layout_timeout_ms)
    }

    pub fn interaction_timeout(&self) -> Duration {
        Duration::from_millis(self.interaction_timeout_ms)
    }

    pub fn ceiling(&self) -> Duration {
        Duration::from_millis(self.ceiling_ms)
    }

    fn normalize(&mut self) {
        self.layout_timeout_ms = self
            .layout_timeout_ms
            .clamp(LAYOUT_TIMEOUT_RANGE_MS.0, LAYOUT_TIMEOUT_RANGE_MS.1);
        self.interaction_timeout_ms = self
            .interaction_timeout_ms
            .clamp(INTERACTION_TIMEOUT_RANGE_MS.0, INTERACTION_TIMEOUT_RANGE_MS.1);
        if self.layout_fallback <= 0.0 {
            self.layout_fallback = Self::default().layout_fallback;
        }
        self.interaction_floor_ms = self.interaction_floor_ms.max(1.0);
        self.interaction_fallback_ms = self.interaction_fallback_ms.max(self.interaction_floor_ms);
        self.min_interactions = self.min_interactions.max(1);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Cached outcomes older than this are evicted on read.
    pub cache_ttl_ms: u64,
    /// Extra readiness attempts before a start is rejected.
    pub start_retries: u32,
    /// First retry delay; doubles on each attempt.
    pub retry_backoff_ms: u64,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 30_000,
            start_retries: 3,
            retry_backoff_ms: 250,
            event_capacity: 64,
        }
    }
}

impl SessionConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn retry_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(1 << attempt.min(16)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyzerConfig {
    pub collection: CollectionConfig,
    pub scoring: ScoringConfig,
    pub session: SessionConfig,
}

impl AnalyzerConfig {
    /// Load from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config.normalized())
    }

    pub fn normalized(mut self) -> Self {
        self.collection.normalize();
        self.scoring.normalize();
        self.session.event_capacity = self.session.event_capacity.max(1);
        self
    }
}
