use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::error::{AnalysisError, ObservationError};
use crate::metrics::MetricKind;

use super::{NavigationTiming, PageFeatures, PerformanceEntry, ResourceEntry};

/// Live entries for one metric kind. Dropping the receiver unsubscribes.
pub type EntryStream = mpsc::Receiver<Result<PerformanceEntry, ObservationError>>;

/// The instrumented page as seen by the collectors.
pub trait PageProbe: Send + Sync {
    /// Current URL; changes when the page navigates.
    fn resource_identifier(&self) -> String;

    /// `true` once the document has finished loading.
    fn load_state(&self) -> watch::Receiver<bool>;

    fn navigation_timing(&self) -> Option<NavigationTiming>;

    fn resources(&self) -> Vec<ResourceEntry>;

    fn features(&self) -> PageFeatures;

    /// Subscribe to entries of `kind`, buffered entries first.
    fn observe(&self, kind: MetricKind) -> Result<EntryStream, ObservationError>;
}

/// Resolves a session to its page once the page confirms it is ready.
#[async_trait]
pub trait PageConnector: Send + Sync {
    async fn connect(&self, session_id: &str) -> Result<Arc<dyn PageProbe>, AnalysisError>;
}
