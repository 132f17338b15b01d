use std::sync::atomic::{AtomicUsize, Ordering};

use tokio_util::sync::CancellationToken;

use crate::config::CollectionConfig;
use crate::error::AnalysisError;
use crate::page::PageProbe;

use super::collector::MetricCollector;
use super::rules::{InteractionRule, LayoutShiftRule, MetricRule, PaintRule};
use super::types::{MetricKind, MetricSample, MetricsBundle, ResourceSummary};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Called as each collector settles with its kind and how many have settled so far.
pub type ResolvedCallback<'a> = dyn Fn(MetricKind, usize) + Send + Sync + 'a;

/// Runs the three collectors of one analysis side by side on the calling task.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    config: CollectionConfig,
}

impl MetricsAggregator {
    pub fn new(config: CollectionConfig) -> Self {
        Self { config }
    }

    /// Collect a full bundle. Individual collector problems become fallback
    /// samples; only `cancel` makes this fail.
    pub async fn collect(
        &self,
        page: &dyn PageProbe,
        cancel: &CancellationToken,
        on_resolved: &ResolvedCallback<'_>,
    ) -> Result<MetricsBundle, AnalysisError> {
        let deadline = CancellationToken::new();
        let resolved = AtomicUsize::new(0);

        let paint = self.track(
            MetricCollector::new(PaintRule::new(&self.config), self.config.paint_timeout()),
            page,
            &deadline,
            cancel,
            &resolved,
            on_resolved,
        );
        let layout = self.track(
            MetricCollector::new(
                LayoutShiftRule::new(&self.config),
                self.config.layout_timeout(),
            ),
            page,
            &deadline,
            cancel,
            &resolved,
            on_resolved,
        );
        let interaction = self.track(
            MetricCollector::new(
                InteractionRule::new(&self.config),
                self.config.interaction_timeout(),
            ),
            page,
            &deadline,
            cancel,
            &resolved,
            on_resolved,
        );

        let collectors = async { tokio::join!(paint, layout, interaction) };
        tokio::pin!(collectors);

        let ceiling = tokio::time::sleep(self.config.ceiling());
        tokio::pin!(ceiling);

        let (paint, layout, interaction) = tokio::select! {
            samples = &mut collectors => samples,
            _ = &mut ceiling => {
                log_warn!(
                    "collection ceiling of {}ms reached, forcing fallback for pending metrics",
                    self.config.ceiling_ms
                );
                deadline.cancel();
                collectors.await
            }
        };

        let bundle = MetricsBundle {
            paint_timing: paint?,
            layout_stability: layout?,
            interaction_latency: interaction?,
            time_to_first_byte_ms: page.navigation_timing().map(|t| t.ttfb_ms()),
            resources: ResourceSummary::from_entries(&page.resources()),
        };

        log_info!(
            "collected metrics: paint={:.2}s layout={:.3} interaction={:.0}ms ({} fallback)",
            bundle.paint_timing.value,
            bundle.layout_stability.value,
            bundle.interaction_latency.value,
            bundle.fallback_count()
        );

        Ok(bundle)
    }

    async fn track<R: MetricRule>(
        &self,
        collector: MetricCollector<R>,
        page: &dyn PageProbe,
        deadline: &CancellationToken,
        cancel: &CancellationToken,
        resolved: &AtomicUsize,
        on_resolved: &ResolvedCallback<'_>,
    ) -> Result<MetricSample, AnalysisError> {
        let sample = collector.run(page, deadline, cancel).await?;
        let count = resolved.fetch_add(1, Ordering::SeqCst) + 1;
        on_resolved(sample.kind, count);
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Confidence;
    use crate::page::{NavigationTiming, PerformanceEntry, ResourceEntry};
    use crate::replay::{PageTrace, ReplayPage, TimedEntry};
    use std::sync::Mutex;
    use std::time::Duration;

    fn shift(at_ms: u64, value: f64) -> TimedEntry {
        TimedEntry {
            at_ms,
            entry: PerformanceEntry::LayoutShift {
                start_time: at_ms as f64,
                value,
                had_recent_input: false,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collects_all_three_and_reports_progress() {
        let page = ReplayPage::new(PageTrace {
            navigation: Some(NavigationTiming {
                request_start: 0.0,
                response_start: 180.0,
                dom_content_loaded_event_end: 900.0,
                load_event_end: 1_400.0,
            }),
            resources: vec![ResourceEntry {
                name: "/main.js".into(),
                initiator_type: "script".into(),
                transfer_size: Some(2048),
                duration: 40.0,
            }],
            entries: vec![
                TimedEntry {
                    at_ms: 0,
                    entry: PerformanceEntry::LargestContentfulPaint { start_time: 1_100.0 },
                },
                shift(0, 0.05),
                shift(1_000, 0.03),
            ],
            ..PageTrace::default()
        });
        let seen = Mutex::new(Vec::new());
        let aggregator = MetricsAggregator::new(CollectionConfig::default());

        let bundle = aggregator
            .collect(&page, &CancellationToken::new(), &|kind, count| {
                seen.lock().unwrap().push((kind, count));
            })
            .await
            .unwrap();

        assert_eq!(bundle.paint_timing.confidence, Confidence::Measured);
        assert!((bundle.paint_timing.value - 1.1).abs() < 1e-9);
        assert!((bundle.layout_stability.value - 0.08).abs() < 1e-9);
        assert_eq!(bundle.interaction_latency.confidence, Confidence::Fallback);
        assert_eq!(bundle.time_to_first_byte_ms, Some(180.0));
        assert_eq!(bundle.resources.script_bytes, 2048);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (MetricKind::PaintTiming, 1));
        assert_eq!(
            seen.iter().map(|(_, count)| *count).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_cuts_slow_collectors_short() {
        let mut config = CollectionConfig::default();
        config.interaction_timeout_ms = 8_000;
        config.ceiling_ms = 3_000;
        let page = ReplayPage::new(PageTrace::default());
        let aggregator = MetricsAggregator::new(config);

        let started = tokio::time::Instant::now();
        let bundle = aggregator
            .collect(&page, &CancellationToken::new(), &|_, _| {})
            .await
            .unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(3_000));
        assert_eq!(bundle.fallback_count(), 3);
        assert_eq!(bundle.paint_timing.value, 3.0);
        assert_eq!(bundle.interaction_latency.value, 200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_collector_does_not_fail_the_bundle() {
        let page = ReplayPage::new(PageTrace {
            unsupported: vec![MetricKind::LayoutStability, MetricKind::InteractionLatency],
            entries: vec![TimedEntry {
                at_ms: 0,
                entry: PerformanceEntry::LargestContentfulPaint { start_time: 900.0 },
            }],
            ..PageTrace::default()
        });
        let aggregator = MetricsAggregator::new(CollectionConfig::default());

        let bundle = aggregator
            .collect(&page, &CancellationToken::new(), &|_, _| {})
            .await
            .unwrap();

        assert!(bundle.paint_timing.is_measured());
        assert_eq!(bundle.layout_stability.confidence, Confidence::Fallback);
        assert_eq!(bundle.interaction_latency.value, 200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_collection() {
        let page = ReplayPage::new(PageTrace::default());
        let aggregator = MetricsAggregator::new(CollectionConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let result = aggregator.collect(&page, &cancel, &|_, _| {}).await;
        assert!(matches!(result, Err(AnalysisError::Cancelled(_))));
        assert_eq!(page.active_subscriptions(), 0);
    }
}
