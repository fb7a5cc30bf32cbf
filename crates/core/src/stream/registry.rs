//! Process-wide bookkeeping of open stream sessions
//!
//! Purely observational. Sessions report into it; nothing reads it back to
//! decide how a session behaves.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use relaygate_domain::StreamSnapshot;
use tracing::debug;

use super::session::StreamSession;

/// Open sessions keyed by session id
#[derive(Debug, Default)]
pub struct StreamRegistry {
    sessions: DashMap<String, StreamSnapshot>,
    opened: AtomicU64,
    closed: AtomicU64,
}

/// Lifetime counters, including sessions that already closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryTotals {
    pub opened: u64,
    pub closed: u64,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: &StreamSession) {
        let started_at = session.started_at();
        self.sessions.insert(
            session.id().to_string(),
            StreamSnapshot {
                started_at,
                event_count: 0,
                last_activity: started_at,
                endpoint: session.endpoint().to_string(),
                owner_id: session.owner_id().map(str::to_string),
            },
        );
        self.opened.fetch_add(1, Ordering::Relaxed);
        debug!(session_id = %session.id(), open = self.sessions.len(), "Stream registered");
    }

    /// Drop a session, returning its final entry
    pub fn unregister(&self, id: &str) -> Option<StreamSnapshot> {
        let removed = self.sessions.remove(id).map(|(_, snapshot)| snapshot);
        if removed.is_some() {
            self.closed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Note that a session emitted another event
    pub fn record_activity(&self, id: &str, event_count: u64) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.event_count = event_count;
            entry.last_activity = Utc::now();
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, StreamSnapshot> {
        self.sessions.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect()
    }

    pub fn totals(&self) -> RegistryTotals {
        RegistryTotals {
            opened: self.opened.load(Ordering::Relaxed),
            closed: self.closed.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Forget every entry. Open sessions keep running and simply stop
    /// appearing in snapshots.
    pub fn clear(&self) {
        self.sessions.clear();
    }
}
