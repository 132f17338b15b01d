use serde::{Deserialize, Serialize};

use crate::metrics::{MetricsBundle, ResourceSummary};
use crate::page::RouterMode;

use super::config::ScoringConfig;

/// Per-metric sub-scores and the composite, each an integer in [0, 100].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub paint_timing: u8,
    pub layout_stability: u8,
    pub interaction_latency: u8,
    pub time_to_first_byte: Option<u8>,
    /// Resource/CSR-adjusted speed score, doubling as the resource-volume sub-score.
    pub speed: u8,
    pub composite: u8,
}

#[derive(Debug, Clone, Default)]
pub struct ScoreCalculator {
    config: ScoringConfig,
}

impl ScoreCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a full bundle. TTFB drops out of the composite when the page
    /// reported no navigation timing; the other weights are renormalized.
    pub fn score(&self, bundle: &MetricsBundle, router: RouterMode) -> ScoreResult {
        let cfg = &self.config;

        let paint = metric_score(bundle.paint_timing.scoring_value(), cfg.paint_threshold_ms);
        let layout = metric_score(bundle.layout_stability.scoring_value(), cfg.layout_threshold);
        let interaction = metric_score(
            bundle.interaction_latency.scoring_value(),
            cfg.interaction_threshold_ms,
        );
        let ttfb = bundle
            .time_to_first_byte_ms
            .map(|ms| metric_score(ms, cfg.ttfb_threshold_ms));
        let speed = self.speed_score(&bundle.resources, router);

        let mut weighted = [
            (paint, cfg.weight_paint),
            (interaction, cfg.weight_interaction),
            (layout, cfg.weight_layout),
            (speed, cfg.weight_resources),
        ]
        .to_vec();
        if let Some(ttfb) = ttfb {
            weighted.push((ttfb, cfg.weight_ttfb));
        }

        ScoreResult {
            paint_timing: paint,
            layout_stability: layout,
            interaction_latency: interaction,
            time_to_first_byte: ttfb,
            speed,
            composite: composite(&weighted),
        }
    }

    /// Byte-volume speed score with a penalty for client-heavy rendering.
    pub fn speed_score(&self, resources: &ResourceSummary, router: RouterMode) -> u8 {
        let cfg = &self.config;
        let mut score = (100.0 - resources.total_kb() / cfg.kb_per_point).max(0.0);

        let client_heavy = resources.script_byte_ratio() > cfg.csr_script_ratio
            || resources.script_count > cfg.csr_script_count;
        if client_heavy {
            let penalty = match router {
                RouterMode::Pages => cfg.csr_penalty_pages,
                RouterMode::App | RouterMode::Unknown => cfg.csr_penalty_other,
            };
            score = (score - penalty).max(0.0);
        }

        if resources.script_kb() > cfg.large_script_kb {
            score = (score - cfg.large_script_penalty).max(0.0);
        }

        to_score(score)
    }
}

/// Quadratic penalty curve: a value at the threshold scores 0.
pub fn metric_score(value: f64, threshold: f64) -> u8 {
    if threshold <= 0.0 || value.is_nan() {
        return 0;
    }
    let ratio = value.max(0.0) / threshold;
    to_score(100.0 - 100.0 * ratio * ratio)
}

fn composite(weighted: &[(u8, f64)]) -> u8 {
    let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return 0;
    }
    let sum: f64 = weighted.iter().map(|(score, w)| *score as f64 * w).sum();
    to_score(sum / total_weight)
}

fn to_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.clamp(0.0, 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Confidence, MetricKind, MetricSample};

    fn bundle(paint_s: f64, layout: f64, interaction_ms: f64, ttfb: Option<f64>) -> MetricsBundle {
        MetricsBundle {
            paint_timing: MetricSample::new(MetricKind::PaintTiming, paint_s, Confidence::Measured),
            layout_stability: MetricSample::new(
                MetricKind::LayoutStability,
                layout,
                Confidence::Measured,
            ),
            interaction_latency: MetricSample::new(
                MetricKind::InteractionLatency,
                interaction_ms,
                Confidence::Measured,
            ),
            time_to_first_byte_ms: ttfb,
            resources: ResourceSummary::default(),
        }
    }

    #[test]
    fn test_paint_curve_example() {
        assert_eq!(metric_score(1_800.0, 2_500.0), 48);
    }

    #[test]
    fn test_curve_bounds() {
        assert_eq!(metric_score(0.0, 0.1), 100);
        assert_eq!(metric_score(0.1, 0.1), 0);
        assert_eq!(metric_score(10_000.0, 100.0), 0);
        assert_eq!(metric_score(f64::NAN, 100.0), 0);
        assert_eq!(metric_score(f64::INFINITY, 100.0), 0);
    }

    #[test]
    fn test_scores_stay_in_range_for_any_input() {
        let calculator = ScoreCalculator::default();
        for paint in [0.0, 0.5, 2.5, 40.0] {
            for layout in [0.0, 0.02, 0.3, 5.0] {
                for interaction in [0.0, 50.0, 200.0, 5_000.0] {
                    for ttfb in [None, Some(0.0), Some(300.0), Some(10_000.0)] {
                        let scores = calculator
                            .score(&bundle(paint, layout, interaction, ttfb), RouterMode::App);
                        for value in [
                            scores.paint_timing,
                            scores.layout_stability,
                            scores.interaction_latency,
                            scores.speed,
                            scores.composite,
                        ] {
                            assert!(value <= 100);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_composite_weights() {
        let calculator = ScoreCalculator::default();
        // paint 48, layout 100, interaction 0, ttfb 100, speed 100
        let scores = calculator.score(&bundle(1.8, 0.0, 250.0, Some(0.0)), RouterMode::App);

        assert_eq!(scores.paint_timing, 48);
        assert_eq!(scores.interaction_latency, 0);
        // 0.35*48 + 0.25*100 + 0.15*100 + 0.10*100 = 66.8
        assert_eq!(scores.composite, 67);
    }

    #[test]
    fn test_composite_renormalizes_without_ttfb() {
        let calculator = ScoreCalculator::default();
        let scores = calculator.score(&bundle(0.0, 0.0, 0.0, None), RouterMode::App);

        assert_eq!(scores.time_to_first_byte, None);
        assert_eq!(scores.composite, 100);
    }

    #[test]
    fn test_speed_score_penalizes_client_heavy_pages() {
        let calculator = ScoreCalculator::default();
        let resources = ResourceSummary {
            total_bytes: 500 * 1024,
            script_bytes: 300 * 1024,
            resource_count: 20,
            script_count: 12,
            slow_count: 0,
        };

        // base 100 - 500/50 = 90; ratio 0.6 > 0.4
        assert_eq!(calculator.speed_score(&resources, RouterMode::Pages), 70);
        assert_eq!(calculator.speed_score(&resources, RouterMode::App), 80);
    }

    #[test]
    fn test_speed_score_large_script_penalty_and_floor() {
        let calculator = ScoreCalculator::default();
        let heavy = ResourceSummary {
            total_bytes: 2_000 * 1024,
            script_bytes: 1_500 * 1024,
            resource_count: 40,
            script_count: 30,
            slow_count: 3,
        };
        // 100 - 40 = 60, -20 CSR, -15 large bundle
        assert_eq!(calculator.speed_score(&heavy, RouterMode::Pages), 25);

        let huge = ResourceSummary {
            total_bytes: 10_000 * 1024,
            ..heavy
        };
        assert_eq!(calculator.speed_score(&huge, RouterMode::Pages), 0);
    }
}
