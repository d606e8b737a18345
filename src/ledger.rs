//! Notification ledger: deduplicating, append-only list of alert messages.
//!
//! DESIGN
//! ======
//! The whole list lives under one store key. Every mutation reads the full
//! list, optionally appends, and rewrites it; nothing is edited in place.
//! Message text is the dedup key, not `id`.
//!
//! CONCURRENCY
//! ===========
//! The read-modify-write cycle in `add` holds no lock. Two writers racing on
//! the same key (two processes sharing a file store, or two poll ticks
//! interleaving) may both miss each other's entry and the later write wins.
//! Occasional duplicates or a lost append are accepted.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::Store;

/// Default store key for the ledger.
pub const DEFAULT_NOTIFICATIONS_KEY: &str = "notificacoes";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Creation timestamp in milliseconds; strictly increasing within a ledger.
    pub id: i64,
    #[serde(rename = "mensagem")]
    pub message: String,
}

// =============================================================================
// CLOCK
// =============================================================================

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    }
}

// =============================================================================
// LEDGER
// =============================================================================

#[derive(Clone)]
pub struct Ledger {
    store: Store,
    key: String,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    #[must_use]
    pub fn new(store: Store, key: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self { store, key: key.into(), clock }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append `message` unless an entry with the same text exists.
    ///
    /// Returns the new entry when it was appended and persisted. `None`
    /// means either a duplicate or a dropped write; the latter has already
    /// been surfaced through the store's notice sink.
    pub fn add(&self, message: &str) -> Option<Notification> {
        let mut entries = self.list();
        if entries.iter().any(|n| n.message == message) {
            debug!(key = %self.key, message, "duplicate notification ignored");
            return None;
        }

        let last_id = entries.iter().map(|n| n.id).max();
        let now = self.clock.now_millis();
        let id = match last_id {
            Some(last) if now <= last => last.saturating_add(1),
            _ => now,
        };

        let entry = Notification { id, message: message.to_owned() };
        entries.push(entry.clone());
        self.store.save(&self.key, &entries).then_some(entry)
    }

    /// Current entries in insertion order. Empty when nothing is stored or
    /// storage is unreadable.
    #[must_use]
    pub fn list(&self) -> Vec<Notification> {
        self.store.load_or(&self.key, Vec::new())
    }

    /// Replace the ledger with an empty list.
    pub fn clear(&self) -> bool {
        self.store.save(&self.key, &Vec::<Notification>::new())
    }
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
