use thiserror::Error;

use crate::metrics::MetricKind;

/// Failure raised by a page's live event stream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ObservationError {
    #[error("{0} observation is not supported by this page")]
    Unsupported(MetricKind),
    #[error("{kind} observer failed: {reason}")]
    Failed { kind: MetricKind, reason: String },
}

/// Errors surfaced by an analysis run or the session boundary.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    /// The page never confirmed it was ready to be instrumented.
    #[error("{0}")]
    Precondition(String),
    #[error("notification channel unavailable: {0}")]
    Transport(String),
    /// A newer run owns the session; this run's output is dropped.
    #[error("analysis for session {0} was superseded by a newer run")]
    Superseded(String),
    #[error("{0} was cancelled")]
    Cancelled(String),
    #[error("{0}")]
    Unexpected(String),
}

impl AnalysisError {
    /// Superseded and cancelled runs end quietly: no cache write, no notification.
    pub fn is_silent(&self) -> bool {
        matches!(self, AnalysisError::Superseded(_) | AnalysisError::Cancelled(_))
    }
}
