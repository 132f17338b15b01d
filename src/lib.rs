pub mod config;
pub mod error;
pub mod metrics;
pub mod page;
pub mod recommendations;
pub mod replay;
pub mod scoring;
pub mod session;
pub mod utils;

pub use config::{AnalyzerConfig, CollectionConfig, SessionConfig};
pub use error::{AnalysisError, ObservationError};
pub use metrics::{MetricKind, MetricSample, MetricsAggregator, MetricsBundle};
pub use page::{PageConnector, PageFeatures, PageProbe, PerformanceEntry};
pub use recommendations::{Recommendation, RecommendationEngine};
pub use replay::{PageTrace, ReplayConnector, ReplayPage};
pub use scoring::{ScoreCalculator, ScoreResult, ScoringConfig};
pub use session::{
    AnalysisResult, AnalysisStatus, AnalyzerEvent, Request, Response, SessionCoordinator,
};
pub use utils::init_logging;
