//! Liveness tracking for runs currently in flight.
//!
//! Best-effort cache, not a source of truth: entries self-expire after a
//! fixed TTL so an abandoned viewer cannot leave a run marked as live
//! forever. Time is always passed in, never read from a clock here.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a running-test marker stays live without being unregistered
pub const RUNNING_TTL_SECS: i64 = 5 * 60;

/// Marker for a run currently believed to be in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningTestEntry {
    pub id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
}

impl RunningTestEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now - self.start_time < Duration::seconds(RUNNING_TTL_SECS)
    }
}

/// In-memory registry of live run markers, keyed by run id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunRegistry {
    entries: Vec<RunningTestEntry>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<RunningTestEntry>) -> Self {
        Self { entries }
    }

    /// Register a run. Re-registering an id replaces the old marker, so no
    /// two entries ever share an id.
    pub fn register(&mut self, id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) {
        let id = id.into();
        self.entries.retain(|e| e.id != id);
        self.entries.push(RunningTestEntry {
            id,
            name: name.into(),
            start_time: now,
        });
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() < before
    }

    /// Entries still inside their TTL, in registration order.
    pub fn list_live(&self, now: DateTime<Utc>) -> Vec<RunningTestEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_live(now))
            .cloned()
            .collect()
    }

    /// Drop expired entries, returning how many were removed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.is_live(now));
        before - self.entries.len()
    }

    pub fn entries(&self) -> &[RunningTestEntry] {
        &self.entries
    }
}
