use serde::{Deserialize, Serialize};

/// Thresholds and weights for the scoring curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoringConfig {
    /// Per-metric thresholds: a value at the threshold scores 0.
    pub paint_threshold_ms: f64,
    pub layout_threshold: f64,
    pub interaction_threshold_ms: f64,
    pub ttfb_threshold_ms: f64,

    /// Composite weights, expected to sum to 1.0.
    pub weight_paint: f64,
    pub weight_interaction: f64,
    pub weight_layout: f64,
    pub weight_ttfb: f64,
    pub weight_resources: f64,

    /// Speed score loses one point per this many kilobytes transferred.
    pub kb_per_point: f64,
    /// Client-heavy rendering signal.
    pub csr_script_ratio: f64,
    pub csr_script_count: usize,
    /// Penalty when the router gives no server-rendering benefit.
    pub csr_penalty_pages: f64,
    pub csr_penalty_other: f64,
    pub large_script_kb: f64,
    pub large_script_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            paint_threshold_ms: 2500.0,
            layout_threshold: 0.1,
            interaction_threshold_ms: 100.0,
            ttfb_threshold_ms: 600.0,
            weight_paint: 0.35,
            weight_interaction: 0.15,
            weight_layout: 0.25,
            weight_ttfb: 0.15,
            weight_resources: 0.10,
            kb_per_point: 50.0,
            csr_script_ratio: 0.4,
            csr_script_count: 15,
            csr_penalty_pages: 20.0,
            csr_penalty_other: 10.0,
            large_script_kb: 1000.0,
            large_script_penalty: 15.0,
        }
    }
}

impl ScoringConfig {
    pub fn total_weight(&self) -> f64 {
        self.weight_paint
            + self.weight_interaction
            + self.weight_layout
            + self.weight_ttfb
            + self.weight_resources
    }

    /// Rescale the composite weights to sum to 1.0. Negative weights count as
    /// zero; an all-zero set falls back to the default weights.
    pub fn normalize(&mut self) {
        let weights = [
            &mut self.weight_paint,
            &mut self.weight_interaction,
            &mut self.weight_layout,
            &mut self.weight_ttfb,
            &mut self.weight_resources,
        ];
        for weight in weights {
            *weight = weight.max(0.0);
        }

        let total = self.total_weight();
        if total <= 0.0 {
            let defaults = Self::default();
            self.weight_paint = defaults.weight_paint;
            self.weight_interaction = defaults.weight_interaction;
            self.weight_layout = defaults.weight_layout;
            self.weight_ttfb = defaults.weight_ttfb;
            self.weight_resources = defaults.weight_resources;
        } else if (total - 1.0).abs() > 1e-9 {
            self.weight_paint /= total;
            self.weight_interaction /= total;
            self.weight_layout /= total;
            self.weight_ttfb /= total;
            self.weight_resources /= total;
        }
    }
}
