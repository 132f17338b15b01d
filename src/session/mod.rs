pub mod commands;
pub mod coordinator;
pub mod events;
pub mod state;
pub mod store;

pub use commands::{Request, Response};
pub use coordinator::{SessionCoordinator, PAGE_NOT_READY};
pub use events::{AnalyzerEvent, EventPublisher};
pub use state::{
    AnalysisOutcome, AnalysisResult, AnalysisStatus, MetricsSummary, Session, SessionStatus,
};
pub use store::{CacheEntry, Generation, SessionStore};
