use std::{
    any::Any,
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{AnalyzerConfig, SessionConfig};
use crate::error::AnalysisError;
use crate::metrics::MetricsAggregator;
use crate::page::{PageConnector, PageProbe};
use crate::recommendations::RecommendationEngine;
use crate::scoring::ScoreCalculator;

use super::events::{AnalyzerEvent, EventPublisher};
use super::state::{AnalysisOutcome, AnalysisResult, AnalysisStatus, Session, SessionStatus};
use super::store::{CacheEntry, Generation, SessionStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Returned when the page never confirms it is ready to be instrumented.
pub const PAGE_NOT_READY: &str =
    "Please refresh the page and try again. The extension needs to be initialized.";

const UNEXPECTED_STOP: &str = "The analysis stopped unexpectedly. Please try again.";

const COLLECTION_START: u8 = 50;
const COLLECTION_SPAN: u8 = 20;

struct LiveSession {
    session: Session,
    generation: Generation,
    page: Option<Arc<dyn PageProbe>>,
    progress: u8,
    message: String,
    cancel: CancellationToken,
}

impl LiveSession {
    fn is_running(&self, generation: Generation) -> bool {
        self.generation == generation && self.session.status == SessionStatus::Running
    }
}

/// Owns session lifecycle: starts runs, tracks their progress, and answers
/// status queries from the cache.
///
/// Lock order is sessions, then store.
#[derive(Clone)]
pub struct SessionCoordinator {
    connector: Arc<dyn PageConnector>,
    store: Arc<SessionStore>,
    sessions: Arc<Mutex<HashMap<String, LiveSession>>>,
    events: EventPublisher,
    aggregator: Arc<MetricsAggregator>,
    scorer: Arc<ScoreCalculator>,
    engine: RecommendationEngine,
    config: SessionConfig,
}

impl SessionCoordinator {
    pub fn new(connector: Arc<dyn PageConnector>, config: AnalyzerConfig) -> Self {
        Self {
            connector,
            store: Arc::new(SessionStore::new(config.session.cache_ttl())),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            events: EventPublisher::new(config.session.event_capacity),
            aggregator: Arc::new(MetricsAggregator::new(config.collection)),
            scorer: Arc::new(ScoreCalculator::new(config.scoring)),
            engine: RecommendationEngine::new(),
            config: config.session,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalyzerEvent> {
        self.events.subscribe()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, LiveSession>> {
        match self.sessions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Begin a fresh analysis for `session_id`, superseding any previous run.
    ///
    /// Returns once the page has confirmed readiness and the run is spawned.
    pub async fn start(&self, session_id: &str) -> Result<Session, AnalysisError> {
        let generation = self.store.start(session_id);
        let cancel = CancellationToken::new();
        let mut session = Session::new(session_id);
        session.status = SessionStatus::Running;

        {
            let mut sessions = self.lock_sessions();
            let previous = sessions.insert(
                session_id.to_string(),
                LiveSession {
                    session: session.clone(),
                    generation,
                    page: None,
                    progress: 0,
                    message: "Starting analysis...".to_string(),
                    cancel: cancel.clone(),
                },
            );
            if let Some(previous) = previous {
                previous.cancel.cancel();
                log_info!(
                    "session {}: run {} superseded by {}",
                    session_id,
                    previous.session.run_id,
                    session.run_id
                );
            }
        }

        let page = match self.connect(session_id, &cancel).await {
            Ok(page) => page,
            Err(err) if err.is_silent() => return Err(err),
            Err(err) => {
                log_warn!("session {session_id}: page not ready: {err}");
                self.reject(session_id, generation);
                return Err(AnalysisError::Precondition(PAGE_NOT_READY.to_string()));
            }
        };

        {
            let mut sessions = self.lock_sessions();
            match sessions.get_mut(session_id) {
                Some(live) if live.generation == generation => {
                    live.session.resource_identifier = page.resource_identifier();
                    live.page = Some(page);
                    session = live.session.clone();
                }
                _ => return Err(AnalysisError::Superseded(session_id.to_string())),
            }
        }

        log_info!(
            "session {}: starting run {} on {}",
            session_id,
            session.run_id,
            session.resource_identifier
        );
        self.spawn_run(session_id.to_string(), generation);
        Ok(session)
    }

    async fn connect(
        &self,
        session_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn PageProbe>, AnalysisError> {
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(AnalysisError::Cancelled(format!("start of session {session_id}")));
                }
                result = self.connector.connect(session_id) => result,
            };

            match result {
                Ok(page) => return Ok(page),
                Err(err) if attempt >= self.config.start_retries => return Err(err),
                Err(err) => {
                    let delay = self.config.retry_delay(attempt);
                    log_debug!(
                        "session {session_id}: readiness check {} failed ({err}), retrying in {}ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(AnalysisError::Cancelled(format!("start of session {session_id}")));
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn reject(&self, session_id: &str, generation: Generation) {
        let mut sessions = self.lock_sessions();
        let Some(live) = sessions.get_mut(session_id) else {
            return;
        };
        if live.generation != generation {
            return;
        }

        let entry = CacheEntry::new(
            session_id,
            live.session.resource_identifier.clone(),
            AnalysisOutcome::Failed {
                message: PAGE_NOT_READY.to_string(),
            },
        );
        if self.store.write(generation, entry).is_ok() {
            live.session.status = SessionStatus::Error;
            live.message = PAGE_NOT_READY.to_string();
        }
    }

    /// Spawn the run and a supervisor that turns a panic into an error outcome.
    fn spawn_run(&self, session_id: String, generation: Generation) {
        let worker = {
            let coordinator = self.clone();
            let session_id = session_id.clone();
            tokio::spawn(async move { coordinator.run_generation(&session_id, generation).await })
        };

        let coordinator = self.clone();
        tokio::spawn(async move {
            match worker.await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => {
                    log_debug!("session {session_id}: run ended with {err}");
                }
                Err(join_err) if join_err.is_panic() => {
                    let message = panic_message(join_err.into_panic());
                    log_error!("session {session_id}: analysis task panicked: {message}");
                    let _ = coordinator.commit(
                        &session_id,
                        generation,
                        Err(AnalysisError::Unexpected(message)),
                    );
                }
                Err(_) => {
                    log_debug!("session {session_id}: analysis task aborted");
                }
            }
        });
    }

    /// Run the current analysis of `session_id` to completion: collect,
    /// score, recommend, then cache and publish the outcome.
    ///
    /// `start` drives this on a spawned task.
    pub async fn run(&self, session_id: &str) -> Result<AnalysisResult, AnalysisError> {
        let generation = self
            .lock_sessions()
            .get(session_id)
            .map(|live| live.generation)
            .ok_or_else(|| {
                AnalysisError::Precondition(format!("session {session_id} was never started"))
            })?;
        self.run_generation(session_id, generation).await
    }

    async fn run_generation(
        &self,
        session_id: &str,
        generation: Generation,
    ) -> Result<AnalysisResult, AnalysisError> {
        let (page, cancel) = {
            let sessions = self.lock_sessions();
            match sessions.get(session_id) {
                Some(live) if live.is_running(generation) => match &live.page {
                    Some(page) => (Arc::clone(page), live.cancel.clone()),
                    None => {
                        return Err(AnalysisError::Precondition(format!(
                            "session {session_id} has no page attached"
                        )))
                    }
                },
                _ => return Err(AnalysisError::Superseded(session_id.to_string())),
            }
        };

        let outcome = self
            .analyze(session_id, generation, page.as_ref(), &cancel)
            .await;
        self.commit(session_id, generation, outcome)
    }

    async fn analyze(
        &self,
        session_id: &str,
        generation: Generation,
        page: &dyn PageProbe,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        self.report_progress(session_id, generation, 10, "Checking page framework...");
        let features = page.features();
        if !features.is_target_framework {
            log_info!("session {session_id}: page is not built with a supported framework");
            return Ok(AnalysisResult::not_target(features));
        }

        self.report_progress(session_id, generation, 30, "Detecting configuration...");
        self.report_progress(
            session_id,
            generation,
            COLLECTION_START,
            "Measuring performance...",
        );

        let bundle = self
            .aggregator
            .collect(page, cancel, &|kind, resolved| {
                let step = f64::from(COLLECTION_SPAN) * resolved as f64 / 3.0;
                let progress = COLLECTION_START + step.round() as u8;
                self.report_progress(session_id, generation, progress, &format!("Measured {kind}"));
            })
            .await?;

        self.report_progress(session_id, generation, 70, "Calculating scores...");
        let scores = self.scorer.score(&bundle, features.router);

        self.report_progress(
            session_id,
            generation,
            90,
            "Generating recommendations...",
        );
        let recommendations = self.engine.generate(&bundle, &scores, &features);
        log_info!(
            "session {}: composite score {} with {} recommendations",
            session_id,
            scores.composite,
            recommendations.len()
        );

        Ok(AnalysisResult::analyzed(
            features,
            bundle,
            scores,
            recommendations,
        ))
    }

    /// Record progress of a running generation. Updates that would move the
    /// progress backwards, or that come from a superseded run, are dropped.
    fn report_progress(&self, session_id: &str, generation: Generation, progress: u8, message: &str) {
        {
            let mut sessions = self.lock_sessions();
            let Some(live) = sessions.get_mut(session_id) else {
                return;
            };
            if !live.is_running(generation) || progress < live.progress {
                return;
            }
            live.progress = progress;
            live.message = message.to_string();
        }

        self.events.publish(AnalyzerEvent::ProgressUpdate {
            session_id: session_id.to_string(),
            progress,
            message: message.to_string(),
        });
    }

    /// Cache and publish the outcome of `generation`. Superseded and
    /// cancelled runs leave no trace.
    fn commit(
        &self,
        session_id: &str,
        generation: Generation,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> Result<AnalysisResult, AnalysisError> {
        if let Err(err) = &outcome {
            if err.is_silent() {
                return outcome;
            }
        }

        {
            let mut sessions = self.lock_sessions();
            let live = match sessions.get_mut(session_id) {
                Some(live) if live.is_running(generation) => live,
                _ => return Err(AnalysisError::Superseded(session_id.to_string())),
            };

            let stored = match &outcome {
                Ok(result) => AnalysisOutcome::Completed {
                    result: result.clone(),
                },
                Err(err) => AnalysisOutcome::Failed {
                    message: err.to_string(),
                },
            };
            self.store.write(
                generation,
                CacheEntry::new(
                    session_id,
                    live.session.resource_identifier.clone(),
                    stored,
                ),
            )?;

            match &outcome {
                Ok(_) => {
                    live.session.status = SessionStatus::Completed;
                    live.progress = 100;
                    live.message = "Analysis complete".to_string();
                }
                Err(err) => {
                    live.session.status = SessionStatus::Error;
                    live.message = err.to_string();
                }
            }
        }

        match &outcome {
            Ok(result) => {
                self.events.publish(AnalyzerEvent::ProgressUpdate {
                    session_id: session_id.to_string(),
                    progress: 100,
                    message: "Analysis complete".to_string(),
                });
                self.events.publish(AnalyzerEvent::AnalysisCompleted {
                    session_id: session_id.to_string(),
                    result: result.clone(),
                });
            }
            Err(err) => {
                log_warn!("session {session_id}: analysis failed: {err}");
                self.events.publish(AnalyzerEvent::AnalysisError {
                    session_id: session_id.to_string(),
                    error: err.to_string(),
                });
            }
        }
        outcome
    }

    /// Status as the UI sees it. A cached outcome for a page that has since
    /// navigated, or one that has expired, reads as not started.
    pub fn get_status(&self, session_id: &str) -> AnalysisStatus {
        let sessions = self.lock_sessions();
        let Some(live) = sessions.get(session_id) else {
            return AnalysisStatus::NotStarted;
        };

        let current_resource = live
            .page
            .as_ref()
            .map(|page| page.resource_identifier())
            .unwrap_or_else(|| live.session.resource_identifier.clone());

        match self.store.get(session_id, &current_resource) {
            Some(entry) => entry.outcome.into(),
            None if live.session.status == SessionStatus::Running => AnalysisStatus::Running {
                progress: live.progress,
                message: live.message.clone(),
            },
            None => AnalysisStatus::NotStarted,
        }
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.lock_sessions()
            .get(session_id)
            .map(|live| live.session.clone())
    }

    /// Cancel any run and forget the session. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        let mut sessions = self.lock_sessions();
        let removed = sessions.remove(session_id);
        self.store.clear(session_id);

        match removed {
            Some(live) => {
                live.cancel.cancel();
                log_debug!("session {session_id}: cleared");
                true
            }
            None => false,
        }
    }

    pub fn clear_all(&self) -> usize {
        let mut sessions = self.lock_sessions();
        for live in sessions.values() {
            live.cancel.cancel();
        }
        let count = sessions.len();
        sessions.clear();
        self.store.clear_all();
        count
    }

    /// The page went away: stop observing it and drop everything about it.
    pub fn teardown(&self, session_id: &str) {
        if self.clear(session_id) {
            log_info!("session {session_id}: page closed, session torn down");
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast_ref::<&str>() {
            Some(message) => (*message).to_string(),
            None => UNEXPECTED_STOP.to_string(),
        },
    }
}
