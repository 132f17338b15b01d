use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::AnalysisError;

use super::state::AnalysisResult;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Fire-and-forget notifications for UI listeners.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AnalyzerEvent {
    #[serde(rename_all = "camelCase")]
    ProgressUpdate {
        session_id: String,
        progress: u8,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    AnalysisCompleted {
        session_id: String,
        result: AnalysisResult,
    },
    #[serde(rename_all = "camelCase")]
    AnalysisError { session_id: String, error: String },
}

impl AnalyzerEvent {
    pub fn session_id(&self) -> &str {
        match self {
            AnalyzerEvent::ProgressUpdate { session_id, .. }
            | AnalyzerEvent::AnalysisCompleted { session_id, .. }
            | AnalyzerEvent::AnalysisError { session_id, .. } => session_id,
        }
    }

    fn action(&self) -> &'static str {
        match self {
            AnalyzerEvent::ProgressUpdate { .. } => "progressUpdate",
            AnalyzerEvent::AnalysisCompleted { .. } => "analysisCompleted",
            AnalyzerEvent::AnalysisError { .. } => "analysisError",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<AnalyzerEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
        self.tx.subscribe()
    }

    /// Deliver to every current listener. Having none is not an error.
    pub fn publish(&self, event: AnalyzerEvent) {
        let action = event.action();
        let session_id = event.session_id().to_string();
        if self.tx.send(event).is_err() {
            let err = AnalysisError::Transport(format!("no listener for {action}"));
            log_debug!("session {session_id}: {err}");
        }
    }
}
