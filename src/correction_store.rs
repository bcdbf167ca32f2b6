//! # Correction Store Module
//!
//! Bounded, append-only log of user corrections. The oldest entry is evicted
//! once the log exceeds its capacity.
//!
//! ## Backends
//!
//! - [`InMemoryCorrectionStore`]: process-local log, used by tests and as the
//!   working set of the file backend
//! - [`JsonFileCorrectionStore`]: persists the log as a JSON document after every
//!   append; a malformed document on load resets the log to empty

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::{error_logging, AppError, AppResult};
use crate::field_set::FieldSet;

/// Default number of corrections kept
pub const DEFAULT_MAX_CORRECTIONS: usize = 100;

/// A committed user edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionEntry {
    /// Recognized text the edited record was extracted from
    pub source_text: String,
    /// Fields as delivered before the edit
    pub original_fields: FieldSet,
    /// Fields after the edit
    pub corrected_fields: FieldSet,
    /// When the edit was committed
    pub timestamp: DateTime<Utc>,
}

impl CorrectionEntry {
    /// Build an entry, returning `None` when the edit changed nothing
    pub fn new(
        source_text: impl Into<String>,
        original_fields: FieldSet,
        corrected_fields: FieldSet,
    ) -> Option<Self> {
        if original_fields == corrected_fields {
            return None;
        }
        Some(Self {
            source_text: source_text.into(),
            original_fields,
            corrected_fields,
            timestamp: Utc::now(),
        })
    }
}

/// Storage abstraction for the correction log
///
/// Implementations must keep insertion order and evict oldest-first.
pub trait CorrectionStore: Send + Sync {
    /// Copy of the log at call time, oldest first
    fn snapshot(&self) -> Vec<CorrectionEntry>;

    /// Append an entry, evicting the oldest past capacity
    fn append(&self, entry: CorrectionEntry) -> AppResult<()>;

    /// Number of stored entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of stored entries
    fn capacity(&self) -> usize;

    /// Remove every entry
    fn clear(&self) -> AppResult<()>;
}

/// In-memory correction log
#[derive(Debug)]
pub struct InMemoryCorrectionStore {
    entries: RwLock<VecDeque<CorrectionEntry>>,
    capacity: usize,
}

impl InMemoryCorrectionStore {
    /// Create an empty store holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Create a store seeded with existing entries, keeping the newest `capacity`
    pub fn with_entries(capacity: usize, entries: Vec<CorrectionEntry>) -> Self {
        let store = Self::new(capacity);
        {
            let mut guard = store.entries.write();
            guard.extend(entries);
            while guard.len() > store.capacity {
                guard.pop_front();
            }
        }
        store
    }
}

impl Default for InMemoryCorrectionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CORRECTIONS)
    }
}

impl CorrectionStore for InMemoryCorrectionStore {
    fn snapshot(&self) -> Vec<CorrectionEntry> {
        self.entries.read().iter().cloned().collect()
    }

    fn append(&self, entry: CorrectionEntry) -> AppResult<()> {
        let mut entries = self.entries.write();
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
            debug!(capacity = self.capacity, "Evicted oldest correction");
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) -> AppResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// On-disk layout of the correction log
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedLog {
    corrections: Vec<CorrectionEntry>,
    last_updated: DateTime<Utc>,
}

/// Correction log persisted as a JSON document
#[derive(Debug)]
pub struct JsonFileCorrectionStore {
    path: PathBuf,
    memory: InMemoryCorrectionStore,
    // Serializes file writes so the document always matches one snapshot
    write_lock: parking_lot::Mutex<()>,
}

impl JsonFileCorrectionStore {
    /// Open the log at `path`
    ///
    /// A missing file starts an empty log. A malformed file is logged and
    /// replaced by an empty log instead of failing.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<PersistedLog>(&content) {
                Ok(log) => {
                    info!(
                        path = %path.display(),
                        entries = log.corrections.len(),
                        last_updated = %log.last_updated,
                        "Loaded correction log"
                    );
                    log.corrections
                }
                Err(e) => {
                    error_logging::log_storage_error(
                        &e,
                        "load_corrections",
                        path.to_str(),
                        None,
                    );
                    warn!(path = %path.display(), "Correction log is malformed, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No correction log found, starting empty");
                Vec::new()
            }
            Err(e) => {
                error_logging::log_storage_error(&e, "load_corrections", path.to_str(), None);
                Vec::new()
            }
        };

        Self {
            path,
            memory: InMemoryCorrectionStore::with_entries(capacity, entries),
            write_lock: parking_lot::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `corrections` atomically; the caller holds `write_lock`
    fn write_log(&self, corrections: Vec<CorrectionEntry>) -> AppResult<()> {
        let log = PersistedLog {
            corrections,
            last_updated: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&log)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(&json)?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| {
            AppError::Storage(format!(
                "Failed to replace correction log {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), entries = log.corrections.len(), "Persisted correction log");
        Ok(())
    }
}

impl CorrectionStore for JsonFileCorrectionStore {
    fn snapshot(&self) -> Vec<CorrectionEntry> {
        self.memory.snapshot()
    }

    // The file is written first; memory only changes once the write succeeded
    fn append(&self, entry: CorrectionEntry) -> AppResult<()> {
        let _guard = self.write_lock.lock();
        let mut next = self.memory.snapshot();
        next.push(entry.clone());
        let excess = next.len().saturating_sub(self.memory.capacity());
        next.drain(..excess);

        self.write_log(next).inspect_err(|e| {
            error_logging::log_storage_error(
                e,
                "append_correction",
                self.path.to_str(),
                Some(self.memory.len()),
            );
        })?;
        self.memory.append(entry)
    }

    fn len(&self) -> usize {
        self.memory.len()
    }

    fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    fn clear(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock();
        self.write_log(Vec::new())?;
        self.memory.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tag: &str) -> CorrectionEntry {
        let original = FieldSet {
            code: tag.to_string(),
            ..Default::default()
        };
        let corrected = FieldSet {
            code: format!("{}-fixed", tag),
            ..Default::default()
        };
        CorrectionEntry::new(format!("text {}", tag), original, corrected).unwrap()
    }

    #[test]
    fn test_identical_edit_builds_no_entry() {
        let fields = FieldSet::default();
        assert!(CorrectionEntry::new("text", fields.clone(), fields).is_none());
    }

    #[test]
    fn test_append_keeps_order() {
        let store = InMemoryCorrectionStore::new(10);
        store.append(entry("a")).unwrap();
        store.append(entry("b")).unwrap();
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].original_fields.code, "a");
        assert_eq!(snapshot[1].original_fields.code, "b");
    }

    #[test]
    fn test_oldest_evicted_first() {
        let store = InMemoryCorrectionStore::new(3);
        for tag in ["a", "b", "c", "d"] {
            store.append(entry(tag)).unwrap();
        }
        let codes: Vec<String> = store
            .snapshot()
            .into_iter()
            .map(|e| e.original_fields.code)
            .collect();
        assert_eq!(codes, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = InMemoryCorrectionStore::new(10);
        store.append(entry("a")).unwrap();
        let snapshot = store.snapshot();
        store.append(entry("b")).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrections.json");

        let store = JsonFileCorrectionStore::open(&path, 10);
        assert!(store.is_empty());
        store.append(entry("a")).unwrap();
        store.append(entry("b")).unwrap();

        let reopened = JsonFileCorrectionStore::open(&path, 10);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.snapshot()[1].corrected_fields.code, "b-fixed");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("lastUpdated").is_some());
        assert_eq!(raw["corrections"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_file_resets_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrections.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let store = JsonFileCorrectionStore::open(&path, 10);
        assert!(store.is_empty());

        store.append(entry("a")).unwrap();
        let reopened = JsonFileCorrectionStore::open(&path, 10);
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_log_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "plain file").unwrap();
        let path = blocker.join("corrections.json");

        let store = JsonFileCorrectionStore::open(&path, 10);
        assert!(store.is_empty());

        assert!(store.append(entry("a")).is_err());
        assert_eq!(store.len(), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn test_failed_write_keeps_earlier_entries() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        let path = nested.join("corrections.json");

        let store = JsonFileCorrectionStore::open(&path, 10);
        store.append(entry("a")).unwrap();

        // Replace the directory with a plain file so the next write fails
        std::fs::remove_dir_all(&nested).unwrap();
        std::fs::write(&nested, "plain file").unwrap();

        assert!(store.append(entry("b")).is_err());
        let codes: Vec<String> = store
            .snapshot()
            .into_iter()
            .map(|e| e.original_fields.code)
            .collect();
        assert_eq!(codes, vec!["a"]);
    }

    #[test]
    fn test_file_store_trims_to_capacity_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrections.json");

        let store = JsonFileCorrectionStore::open(&path, 10);
        for tag in ["a", "b", "c", "d"] {
            store.append(entry(tag)).unwrap();
        }

        let smaller = JsonFileCorrectionStore::open(&path, 2);
        let codes: Vec<String> = smaller
            .snapshot()
            .into_iter()
            .map(|e| e.original_fields.code)
            .collect();
        assert_eq!(codes, vec!["c", "d"]);
    }
}
