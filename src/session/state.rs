use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::MetricsBundle;
use crate::page::PageFeatures;
use crate::recommendations::Recommendation;
use crate::scoring::ScoreResult;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    NotStarted,
    Running,
    Completed,
    Error,
}

/// One analysis run for one page visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub run_id: String,
    /// URL of the page when the run started; empty until the page connects.
    pub resource_identifier: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            run_id: Uuid::new_v4().to_string(),
            resource_identifier: String::new(),
            status: SessionStatus::NotStarted,
            created_at: Utc::now(),
        }
    }
}

/// Headline numbers shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    /// Seconds.
    pub paint_timing: f64,
    pub layout_stability: f64,
    /// Milliseconds.
    pub interaction_latency: f64,
    pub composite_score: u8,
    pub speed_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_target_framework: bool,
    pub metrics: Option<MetricsSummary>,
    pub features: PageFeatures,
    pub recommendations: Vec<Recommendation>,
    pub bundle: Option<MetricsBundle>,
    pub scores: Option<ScoreResult>,
}

impl AnalysisResult {
    pub fn analyzed(
        features: PageFeatures,
        bundle: MetricsBundle,
        scores: ScoreResult,
        recommendations: Vec<Recommendation>,
    ) -> Self {
        Self {
            is_target_framework: true,
            metrics: Some(MetricsSummary {
                paint_timing: bundle.paint_timing.value,
                layout_stability: bundle.layout_stability.value,
                interaction_latency: bundle.interaction_latency.value,
                composite_score: scores.composite,
                speed_score: scores.speed,
            }),
            features,
            recommendations,
            bundle: Some(bundle),
            scores: Some(scores),
        }
    }

    /// The page is not built with the framework this analyzer targets.
    pub fn not_target(features: PageFeatures) -> Self {
        Self {
            is_target_framework: false,
            metrics: None,
            features,
            recommendations: Vec::new(),
            bundle: None,
            scores: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AnalysisOutcome {
    Completed { result: AnalysisResult },
    Failed { message: String },
}

/// What `GetResults` reports for a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisStatus {
    NotStarted,
    #[serde(rename = "in_progress")]
    Running { progress: u8, message: String },
    Completed { result: AnalysisResult },
    Error { message: String },
}

impl From<AnalysisOutcome> for AnalysisStatus {
    fn from(outcome: AnalysisOutcome) -> Self {
        match outcome {
            AnalysisOutcome::Completed { result } => AnalysisStatus::Completed { result },
            AnalysisOutcome::Failed { message } => AnalysisStatus::Error { message },
        }
    }
}
