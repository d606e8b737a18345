//! Persistent key-value store.
//!
//! DESIGN
//! ======
//! `Store` wraps a string-keyed `StorageBackend` (the shape of browser
//! `localStorage`) and layers typed JSON encoding on top. Two APIs sit side
//! by side:
//!
//! - `try_save` / `try_load` return explicit `Result`s.
//! - `save` / `load_or` apply the dashboard policy: a failed write raises a
//!   blocking notice and returns `false`, a failed read yields the caller's
//!   default. Neither ever returns an error.
//!
//! The store is `Clone` and passed to whoever needs it; there is no global
//! instance, so tests inject a `MemoryBackend`.
//!
//! QUOTA
//! =====
//! Both backends may carry a byte quota over the sum of key and value
//! lengths. A write that would exceed it fails with `QuotaExceeded` and the
//! previous value stays in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Message shown to the user when a write is dropped.
pub const SAVE_FAILED_NOTICE: &str = "failed to save data";

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage quota exceeded ({needed} bytes needed, limit {limit})")]
    QuotaExceeded { needed: usize, limit: usize },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("value could not be encoded: {0}")]
    Encode(serde_json::Error),
    #[error("stored value could not be decoded: {0}")]
    Decode(serde_json::Error),
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Raw string storage. Implementations must be safe to share across tasks.
pub trait StorageBackend: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove_item(&self, key: &str) -> Result<(), StoreError>;
}

/// Bytes used by `items` once `key` holds `value`.
fn usage_with(items: &BTreeMap<String, String>, key: &str, value: &str) -> usize {
    items
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum::<usize>()
        + key.len()
        + value.len()
}

fn check_quota(quota: Option<usize>, items: &BTreeMap<String, String>, key: &str, value: &str) -> Result<(), StoreError> {
    if let Some(limit) = quota {
        let needed = usage_with(items, key, value);
        if needed > limit {
            return Err(StoreError::QuotaExceeded { needed, limit });
        }
    }
    Ok(())
}

/// In-memory backend for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryBackend {
    items: Mutex<BTreeMap<String, String>>,
    quota: Option<usize>,
    unavailable: AtomicBool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(limit: usize) -> Self {
        Self { quota: Some(limit), ..Self::default() }
    }

    /// Make every subsequent call fail, as a disabled browser storage would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Write a raw string, skipping the quota. Used to seed corrupt data.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("storage disabled".into()));
        }
        Ok(())
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        let items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        check_quota(self.quota, &items, key, value)?;
        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// File backend: one JSON object mapping keys to raw strings.
///
/// Every call re-reads the file, so separate processes sharing a path see
/// each other's writes with last-writer-wins semantics. Each write goes to
/// its own sibling temp file and is renamed into place, so readers only ever
/// see a complete document.
///
/// A document that no longer parses is treated as empty by writers: the next
/// write replaces it rather than failing forever.
pub struct FileBackend {
    path: PathBuf,
    quota: Option<usize>,
    lock: Mutex<()>,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, quota: Option<usize>) -> Self {
        Self { path: path.into(), quota, lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(StoreError::Decode)
    }

    /// Current document for a read-modify-write. Corrupt contents count as
    /// empty so one bad write cannot block every key.
    fn read_for_write(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match self.read_all() {
            Err(StoreError::Decode(e)) => {
                warn!(path = %self.path.display(), error = %e, "store file unreadable, starting from empty");
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    /// Unique per process and per write.
    fn temp_path(&self) -> PathBuf {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let seq = NEXT.fetch_add(1, Ordering::Relaxed);
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(".{}.{seq}.tmp", std::process::id()));
        PathBuf::from(tmp)
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(items).map_err(StoreError::Encode)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, encoded)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_for_write()?;
        check_quota(self.quota, &items, key, value)?;
        items.insert(key.to_owned(), value.to_owned());
        self.write_all(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut items = self.read_for_write()?;
        if items.remove(key).is_some() {
            self.write_all(&items)?;
        }
        Ok(())
    }
}

// =============================================================================
// NOTICE SINK
// =============================================================================

/// Where blocking user notices go. The dashboard shows a modal alert; the
/// CLI writes to stderr.
pub trait Notice: Send + Sync {
    fn alert(&self, message: &str);
}

/// Notice sink that only logs.
pub struct LogNotice;

impl Notice for LogNotice {
    fn alert(&self, message: &str) {
        tracing::error!(notice = message, "user notice");
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StorageBackend>,
    notice: Arc<dyn Notice>,
}

impl Store {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, notice: Arc<dyn Notice>) -> Self {
        Self { backend, notice }
    }

    /// Store over a fresh `MemoryBackend` with a logging notice sink.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), Arc::new(LogNotice))
    }

    /// Encode `value` as JSON and write it under `key`, replacing any
    /// previous value.
    pub fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(value).map_err(StoreError::Encode)?;
        self.backend.set_item(key, &encoded)
    }

    /// Read and decode the value under `key`. `Ok(None)` when the key is
    /// absent or holds an empty string.
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.backend.get_item(key)? {
            Some(raw) if !raw.is_empty() => serde_json::from_str(&raw).map(Some).map_err(StoreError::Decode),
            _ => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.backend.remove_item(key)
    }

    /// Write with the blocking-notice policy. Returns whether the value was
    /// persisted.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_save(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "store write dropped");
                self.notice.alert(SAVE_FAILED_NOTICE);
                false
            }
        }
    }

    /// Read with the silent-default policy.
    pub fn load_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_load(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                debug!(key, error = %e, "store read fell back to default");
                default
            }
        }
    }
}


#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
