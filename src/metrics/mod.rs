pub mod aggregator;
pub mod collector;
pub mod rules;
mod types;

pub use aggregator::{MetricsAggregator, ResolvedCallback};
pub use collector::{CollectorState, MetricCollector};
pub use rules::{InteractionRule, LayoutShiftRule, MetricRule, PaintRule};
pub use types::{Confidence, MetricKind, MetricSample, MetricsBundle, ResourceSummary, Unit};
