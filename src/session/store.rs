use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::AnalysisError;

use super::state::AnalysisOutcome;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Identifies one run of a session. Only the newest run may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Generation(u64);

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub session_id: String,
    pub resource_identifier: String,
    pub outcome: AnalysisOutcome,
    pub written_at: DateTime<Utc>,
    #[serde(skip)]
    written: Instant,
}

impl CacheEntry {
    pub fn new(
        session_id: impl Into<String>,
        resource_identifier: impl Into<String>,
        outcome: AnalysisOutcome,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            resource_identifier: resource_identifier.into(),
            outcome,
            written_at: Utc::now(),
            written: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.written.elapsed()
    }
}

struct Slot {
    generation: Generation,
    entry: Option<CacheEntry>,
}

/// Latest outcome per session id. At most one entry per id; stale entries
/// are evicted when read.
pub struct SessionStore {
    slots: Mutex<HashMap<String, Slot>>,
    next_generation: AtomicU64,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Begin a new run: discard any entry and hand out a fresh generation.
    pub fn start(&self, session_id: &str) -> Generation {
        let generation = Generation(self.next_generation.fetch_add(1, Ordering::SeqCst));
        let previous = self.lock().insert(
            session_id.to_string(),
            Slot {
                generation,
                entry: None,
            },
        );

        if let Some(previous) = previous {
            log_debug!(
                "session {} restarted: generation {} supersedes {}",
                session_id,
                generation.0,
                previous.generation.0
            );
        }
        generation
    }

    pub fn is_current(&self, session_id: &str, generation: Generation) -> bool {
        self.lock()
            .get(session_id)
            .is_some_and(|slot| slot.generation == generation)
    }

    /// Store the outcome of `generation`. Fails when a newer run owns the
    /// session or the session was cleared in the meantime.
    pub fn write(&self, generation: Generation, entry: CacheEntry) -> Result<(), AnalysisError> {
        let mut slots = self.lock();
        match slots.get_mut(&entry.session_id) {
            Some(slot) if slot.generation == generation => {
                slot.entry = Some(entry);
                Ok(())
            }
            _ => {
                log_info!(
                    "dropping outcome of superseded generation {} for session {}",
                    generation.0,
                    entry.session_id
                );
                Err(AnalysisError::Superseded(entry.session_id))
            }
        }
    }

    /// Fresh entry for the session, if any. An entry older than the TTL or
    /// recorded for a different resource is evicted instead.
    pub fn get(&self, session_id: &str, current_resource: &str) -> Option<CacheEntry> {
        let mut slots = self.lock();
        let slot = slots.get_mut(session_id)?;
        let entry = slot.entry.as_ref()?;

        let stale_reason = if entry.age() > self.ttl {
            Some("expired")
        } else if entry.resource_identifier != current_resource {
            Some("page navigated")
        } else {
            None
        };

        match stale_reason {
            Some(reason) => {
                log_debug!("evicting cached result for session {session_id}: {reason}");
                slot.entry = None;
                None
            }
            None => Some(entry.clone()),
        }
    }

    /// Forget the session entirely. In-flight runs can no longer write.
    pub fn clear(&self, session_id: &str) -> bool {
        let removed = self.lock().remove(session_id);
        removed.is_some_and(|slot| slot.entry.is_some())
    }

    pub fn clear_all(&self) -> usize {
        let mut slots = self.lock();
        let count = slots.values().filter(|slot| slot.entry.is_some()).count();
        slots.clear();
        count
    }

    pub fn entry_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| slot.entry.is_some())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_millis(30_000);

    fn failed(session_id: &str, resource: &str) -> CacheEntry {
        CacheEntry::new(
            session_id,
            resource,
            AnalysisOutcome::Failed {
                message: "boom".into(),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = SessionStore::new(TTL);
        let generation = store.start("tab-1");
        store.write(generation, failed("tab-1", "https://a.test/")).unwrap();

        tokio::time::advance(Duration::from_millis(30_000)).await;
        assert!(store.get("tab-1", "https://a.test/").is_some());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(store.get("tab-1", "https://a.test/").is_none());
        assert_eq!(store.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_evicts_within_ttl() {
        let store = SessionStore::new(TTL);
        let generation = store.start("tab-1");
        store.write(generation, failed("tab-1", "https://a.test/")).unwrap();

        assert!(store.get("tab-1", "https://a.test/other").is_none());
        // Evicted, not just hidden.
        assert!(store.get("tab-1", "https://a.test/").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_generation_cannot_write() {
        let store = SessionStore::new(TTL);
        let first = store.start("tab-1");
        let second = store.start("tab-1");

        let late = store.write(first, failed("tab-1", "https://a.test/"));
        assert_eq!(late, Err(AnalysisError::Superseded("tab-1".into())));
        assert!(store.get("tab-1", "https://a.test/").is_none());

        store.write(second, failed("tab-1", "https://a.test/")).unwrap();
        assert!(store.get("tab-1", "https://a.test/").is_some());
        assert!(store.is_current("tab-1", second));
        assert!(!store.is_current("tab-1", first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_leaves_at_most_one_entry() {
        let store = SessionStore::new(TTL);
        let generation = store.start("tab-1");
        store.write(generation, failed("tab-1", "u")).unwrap();
        assert_eq!(store.entry_count(), 1);

        store.start("tab-1");
        assert_eq!(store.entry_count(), 0);
        let generation = store.start("tab-1");
        store.write(generation, failed("tab-1", "u")).unwrap();
        assert_eq!(store.entry_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_blocks_in_flight_writes() {
        let store = SessionStore::new(TTL);
        let generation = store.start("tab-1");
        assert!(!store.clear("tab-1"), "nothing cached yet");

        assert!(store.write(generation, failed("tab-1", "u")).is_err());

        let a = store.start("tab-a");
        let b = store.start("tab-b");
        store.write(a, failed("tab-a", "u")).unwrap();
        store.write(b, failed("tab-b", "u")).unwrap();
        assert!(store.clear("tab-a"));
        assert_eq!(store.clear_all(), 1);
        assert_eq!(store.entry_count(), 0);
    }
}
