pub mod rules;
mod types;

pub use rules::{Rule, RuleContext, RULES};
pub use types::{Category, Impact, Recommendation};

use crate::metrics::MetricsBundle;
use crate::page::PageFeatures;
use crate::scoring::ScoreResult;

/// Evaluates the fixed rule list. Stateless: every analysis gets a fresh list.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationEngine;

impl RecommendationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Technical advice before informational, high impact first within a
    /// category, evaluation order otherwise.
    pub fn generate(
        &self,
        bundle: &MetricsBundle,
        scores: &ScoreResult,
        features: &PageFeatures,
    ) -> Vec<Recommendation> {
        let ctx = RuleContext {
            bundle,
            scores,
            features,
        };
        let mut recommendations: Vec<Recommendation> =
            RULES.iter().filter_map(|rule| rule(&ctx)).collect();

        // Stable: equal keys keep rule order.
        recommendations.sort_by_key(|rec| (rec.category, rec.impact));
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Confidence, MetricKind, MetricSample, ResourceSummary};
    use crate::page::RouterMode;
    use crate::scoring::ScoreCalculator;

    fn bundle(paint_s: f64, layout: f64, interaction: MetricSample) -> MetricsBundle {
        MetricsBundle {
            paint_timing: MetricSample::new(MetricKind::PaintTiming, paint_s, Confidence::Measured),
            layout_stability: MetricSample::new(
                MetricKind::LayoutStability,
                layout,
                Confidence::Measured,
            ),
            interaction_latency: interaction,
            time_to_first_byte_ms: Some(900.0),
            resources: ResourceSummary {
                total_bytes: 3_000 * 1024,
                script_bytes: 1_200 * 1024,
                resource_count: 40,
                script_count: 22,
                slow_count: 4,
            },
        }
    }

    fn assert_ordered(recs: &[Recommendation]) {
        for pair in recs.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                !(a.category == Category::Informational && b.category == Category::Technical),
                "informational entry {:?} precedes technical {:?}",
                a.title,
                b.title
            );
            if a.category == b.category {
                assert!(a.impact <= b.impact, "{} before {}", a.title, b.title);
            }
        }
    }

    #[test]
    fn test_slow_heavy_page_orders_high_impact_first() {
        let bundle = bundle(
            4.5,
            0.3,
            MetricSample::new(MetricKind::InteractionLatency, 450.0, Confidence::Measured),
        );
        let features = PageFeatures {
            is_target_framework: true,
            router: RouterMode::Pages,
            unoptimized_images: 5,
            ..PageFeatures::default()
        };
        let scores = ScoreCalculator::default().score(&bundle, features.router);
        let recs = RecommendationEngine::new().generate(&bundle, &scores, &features);

        assert_ordered(&recs);
        let titles: Vec<&str> = recs.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Reduce JavaScript Bundle Size",
                "Move Non-Interactive Components to the Server",
                "Optimize Data Fetching",
                "Optimize Largest Contentful Paint",
                "Reduce Interaction Latency",
                "Reduce Page Size",
                "Enable the Built-in Minifier",
                "Optimize Font Loading",
                "Reduce Layout Shifts",
                "Improve Server Response Time",
                "Upgrade to App Router",
                "Use Image Optimization",
                "Review Page Metadata",
                "Validate With Field Data",
            ]
        );
    }

    #[test]
    fn test_fast_page_still_gets_baseline_advice() {
        let mut bundle = bundle(
            1.0,
            0.01,
            MetricSample::new(MetricKind::InteractionLatency, 80.0, Confidence::Measured),
        );
        bundle.time_to_first_byte_ms = Some(120.0);
        bundle.resources = ResourceSummary::default();
        let features = PageFeatures {
            is_target_framework: true,
            router: RouterMode::Unknown,
            ..PageFeatures::default()
        };
        let scores = ScoreCalculator::default().score(&bundle, features.router);
        let recs = RecommendationEngine::new().generate(&bundle, &scores, &features);

        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].title, "Optimize App Router Usage");
        assert_eq!(recs[0].category, Category::Technical);
        assert_eq!(recs[0].impact, Impact::Medium);
        assert!(recs[1..].iter().all(|r| r.category == Category::Informational));
    }

    #[test]
    fn test_fallback_interaction_value_gives_no_advice() {
        let bundle = bundle(
            1.0,
            0.01,
            MetricSample::new(MetricKind::InteractionLatency, 900.0, Confidence::Fallback),
        );
        let features = PageFeatures::default();
        let scores = ScoreCalculator::default().score(&bundle, features.router);
        let recs = RecommendationEngine::new().generate(&bundle, &scores, &features);

        assert!(recs.iter().all(|r| r.title != "Reduce Interaction Latency"));
        assert_ordered(&recs);
    }

    #[test]
    fn test_generation_is_repeatable() {
        let bundle = bundle(
            3.0,
            0.2,
            MetricSample::new(MetricKind::InteractionLatency, 300.0, Confidence::Measured),
        );
        let features = PageFeatures {
            router: RouterMode::App,
            ..PageFeatures::default()
        };
        let scores = ScoreCalculator::default().score(&bundle, features.router);
        let engine = RecommendationEngine::new();

        assert_eq!(
            engine.generate(&bundle, &scores, &features),
            engine.generate(&bundle, &scores, &features)
        );
    }
}
