//! Plays a recorded page trace back as a live page.
//!
//! Entries are delivered at their recorded offsets from the moment the page
//! is created, so a trace drives collectors exactly like a real page would.
//! Streams stay open after the last entry, as a real performance observer
//! does.

use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, watch},
    time::Instant,
};

use crate::error::{AnalysisError, ObservationError};
use crate::metrics::MetricKind;
use crate::page::{
    EntryStream, NavigationTiming, PageConnector, PageFeatures, PageProbe, PerformanceEntry,
    ResourceEntry,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = false;

use crate::log_debug;

const STREAM_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedEntry {
    /// Delivery offset from page creation.
    pub at_ms: u64,
    pub entry: PerformanceEntry,
}

/// A recorded page visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageTrace {
    pub url: String,
    /// When the document finishes loading; `None` means already loaded.
    pub ready_at_ms: Option<u64>,
    pub navigation: Option<NavigationTiming>,
    pub resources: Vec<ResourceEntry>,
    pub features: PageFeatures,
    pub entries: Vec<TimedEntry>,
    /// Kinds the page cannot observe at all.
    pub unsupported: Vec<MetricKind>,
    /// Kinds whose observer fails right after subscribing.
    pub faulty: Vec<MetricKind>,
}

impl PageTrace {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read page trace from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse page trace {}", path.display()))
    }
}

type EntrySender = mpsc::Sender<Result<PerformanceEntry, ObservationError>>;

pub struct ReplayPage {
    trace: PageTrace,
    url: Mutex<String>,
    started: Instant,
    load_tx: Arc<watch::Sender<bool>>,
    subscriptions: Mutex<Vec<EntrySender>>,
}

impl ReplayPage {
    /// Must be called inside a tokio runtime when the trace has a `ready_at_ms`.
    pub fn new(trace: PageTrace) -> Self {
        let started = Instant::now();
        let ready_now = trace.ready_at_ms.map_or(true, |at| at == 0);
        let (load_tx, _) = watch::channel(ready_now);
        let load_tx = Arc::new(load_tx);

        if let Some(at) = trace.ready_at_ms.filter(|at| *at > 0) {
            let load_tx = Arc::clone(&load_tx);
            tokio::spawn(async move {
                tokio::time::sleep_until(started + Duration::from_millis(at)).await;
                load_tx.send_replace(true);
            });
        }

        Self {
            url: Mutex::new(trace.url.clone()),
            trace,
            started,
            load_tx,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Simulate the page moving to another URL.
    pub fn navigate(&self, url: impl Into<String>) {
        *lock(&self.url) = url.into();
    }

    /// Streams whose receiver is still held by someone.
    pub fn active_subscriptions(&self) -> usize {
        let mut subscriptions = lock(&self.subscriptions);
        subscriptions.retain(|tx| !tx.is_closed());
        subscriptions.len()
    }
}

impl PageProbe for ReplayPage {
    fn resource_identifier(&self) -> String {
        lock(&self.url).clone()
    }

    fn load_state(&self) -> watch::Receiver<bool> {
        self.load_tx.subscribe()
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        self.trace.navigation
    }

    fn resources(&self) -> Vec<ResourceEntry> {
        self.trace.resources.clone()
    }

    fn features(&self) -> PageFeatures {
        self.trace.features.clone()
    }

    fn observe(&self, kind: MetricKind) -> Result<EntryStream, ObservationError> {
        if self.trace.unsupported.contains(&kind) {
            return Err(ObservationError::Unsupported(kind));
        }

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        lock(&self.subscriptions).push(tx.clone());

        let faulty = self.trace.faulty.contains(&kind);
        let mut entries: Vec<TimedEntry> = self
            .trace
            .entries
            .iter()
            .filter(|timed| timed.entry.kind() == kind)
            .cloned()
            .collect();
        entries.sort_by_key(|timed| timed.at_ms);
        let started = self.started;

        tokio::spawn(async move {
            if faulty {
                let failure = ObservationError::Failed {
                    kind,
                    reason: "observer disconnected".into(),
                };
                if tx.send(Err(failure)).await.is_err() {
                    return;
                }
            }
            for timed in entries {
                tokio::time::sleep_until(started + Duration::from_millis(timed.at_ms)).await;
                if tx.send(Ok(timed.entry)).await.is_err() {
                    log_debug!("{kind} subscriber went away, stopping replay");
                    return;
                }
            }
        });

        Ok(rx)
    }
}

/// Hands out replay pages by session id.
#[derive(Default)]
pub struct ReplayConnector {
    pages: Mutex<HashMap<String, Arc<ReplayPage>>>,
    /// Readiness checks that fail before a page answers.
    unanswered: Mutex<HashMap<String, u32>>,
    attempts: AtomicUsize,
}

impl ReplayConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session_id: impl Into<String>, page: Arc<ReplayPage>) {
        lock(&self.pages).insert(session_id.into(), page);
    }

    /// The next `count` readiness checks for `session_id` go unanswered.
    pub fn fail_next(&self, session_id: impl Into<String>, count: u32) {
        lock(&self.unanswered).insert(session_id.into(), count);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageConnector for ReplayConnector {
    async fn connect(&self, session_id: &str) -> Result<Arc<dyn PageProbe>, AnalysisError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(remaining) = lock(&self.unanswered).get_mut(session_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AnalysisError::Precondition(format!(
                    "page for session {session_id} did not answer the readiness check"
                )));
            }
        }

        match lock(&self.pages).get(session_id) {
            Some(page) => Ok(Arc::clone(page) as Arc<dyn PageProbe>),
            None => Err(AnalysisError::Precondition(format!(
                "no page is attached to session {session_id}"
            ))),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
