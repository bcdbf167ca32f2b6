//! # Submission Deduplication Module
//!
//! This module decides whether an incoming receipt image is a resubmission of
//! one already seen, so the same physical receipt is not extracted or stored
//! twice. A submission is a duplicate when any of these hold:
//!
//! - its id matches a known submission
//! - it shares (filename, size, owner) with a known submission
//! - its id is in the processed-id set
//! - its content hash matches a known submission's hash

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// An incoming item as seen by the duplicate detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Caller-assigned identifier
    pub id: String,
    /// Original file name
    pub filename: String,
    /// File size in bytes
    pub size: u64,
    /// Uploading user or account
    pub owner: String,
    /// Hex SHA-256 of the file content, when known
    pub content_hash: Option<String>,
}

impl Submission {
    /// Create a new submission without a content hash
    pub fn new(
        id: impl Into<String>,
        filename: impl Into<String>,
        size: u64,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            size,
            owner: owner.into(),
            content_hash: None,
        }
    }

    /// Attach the hash of `content`
    pub fn with_content(mut self, content: &[u8]) -> Self {
        self.content_hash = Some(content_hash(content));
        self
    }

    fn same_file_as(&self, other: &Submission) -> bool {
        self.filename == other.filename && self.size == other.size && self.owner == other.owner
    }
}

/// Hex-encoded SHA-256 of `content`
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Bounded set of ids whose extraction already finished
///
/// Once full, the oldest id is forgotten first.
#[derive(Debug, Clone)]
pub struct ProcessedIds {
    ids: HashSet<String>,
    order: VecDeque<String>,
    max_entries: usize,
}

impl ProcessedIds {
    pub fn new(max_entries: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Insert an id; returns false when it was already present
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.ids.contains(&id) {
            return false;
        }
        if self.order.len() >= self.max_entries {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
        self.ids.insert(id.clone());
        self.order.push_back(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for ProcessedIds {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Decide whether `candidate` resubmits something already seen
///
/// Checks are evaluated in order and short-circuit on the first hit.
pub fn is_duplicate(candidate: &Submission, known: &[Submission], processed: &ProcessedIds) -> bool {
    if known.iter().any(|item| item.id == candidate.id) {
        debug!(id = %candidate.id, "Duplicate by id");
        return true;
    }
    if known.iter().any(|item| item.same_file_as(candidate)) {
        debug!(id = %candidate.id, filename = %candidate.filename, "Duplicate by file identity");
        return true;
    }
    if processed.contains(&candidate.id) {
        debug!(id = %candidate.id, "Duplicate by processed id");
        return true;
    }
    if let Some(hash) = &candidate.content_hash {
        if known
            .iter()
            .any(|item| item.content_hash.as_deref() == Some(hash.as_str()))
        {
            debug!(id = %candidate.id, "Duplicate by content hash");
            return true;
        }
    }
    false
}

#[derive(Debug, Default)]
struct DetectorState {
    known: Vec<Submission>,
    processed: ProcessedIds,
    duplicates_seen: u64,
}

/// Thread-safe owner of known submissions and processed ids
#[derive(Debug)]
pub struct DuplicateDetector {
    state: Mutex<DetectorState>,
}

impl DuplicateDetector {
    /// Create a detector remembering up to `processed_capacity` processed ids
    pub fn new(processed_capacity: usize) -> Self {
        Self {
            state: Mutex::new(DetectorState {
                known: Vec::new(),
                processed: ProcessedIds::new(processed_capacity),
                duplicates_seen: 0,
            }),
        }
    }

    /// Check `candidate` and register it when it is new
    ///
    /// Returns true if this is a duplicate that should be skipped,
    /// false if it's a new submission that should be processed.
    pub fn check_and_register(&self, candidate: Submission) -> bool {
        let mut state = self.state.lock();
        if is_duplicate(&candidate, &state.known, &state.processed) {
            state.duplicates_seen += 1;
            metrics::counter!("receipt_duplicates_total").increment(1);
            return true;
        }
        state.known.push(candidate);
        false
    }

    /// Check without registering
    pub fn is_duplicate(&self, candidate: &Submission) -> bool {
        let state = self.state.lock();
        is_duplicate(candidate, &state.known, &state.processed)
    }

    /// Record that extraction finished for `id`
    pub fn mark_processed(&self, id: &str) {
        self.state.lock().processed.insert(id);
    }

    /// Forget a known submission so it can be submitted again
    pub fn forget(&self, id: &str) {
        self.state.lock().known.retain(|item| item.id != id);
    }

    /// Get statistics about the detector
    pub fn stats(&self) -> DeduplicationStats {
        let state = self.state.lock();
        DeduplicationStats {
            known_submissions: state.known.len(),
            processed_ids: state.processed.len(),
            duplicates_seen: state.duplicates_seen,
        }
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Statistics about the deduplication system
#[derive(Debug, Clone, PartialEq)]
pub struct DeduplicationStats {
    pub known_submissions: usize,
    pub processed_ids: usize,
    pub duplicates_seen: u64,
}

/// Thread-safe wrapper for duplicate detection
pub type SharedDuplicateDetector = Arc<DuplicateDetector>;

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(id: &str, filename: &str) -> Submission {
        Submission::new(id, filename, 2048, "ahmed")
    }

    #[test]
    fn test_identical_id_is_duplicate() {
        let known = vec![submission("r-1", "a.jpg")];
        let candidate = submission("r-1", "other.jpg");
        assert!(is_duplicate(&candidate, &known, &ProcessedIds::default()));
    }

    #[test]
    fn test_same_file_identity_is_duplicate() {
        let known = vec![submission("r-1", "a.jpg")];
        let candidate = submission("r-2", "a.jpg");
        assert!(is_duplicate(&candidate, &known, &ProcessedIds::default()));

        let other_owner = Submission::new("r-3", "a.jpg", 2048, "sara");
        assert!(!is_duplicate(&other_owner, &known, &ProcessedIds::default()));
    }

    #[test]
    fn test_processed_id_is_duplicate() {
        let mut processed = ProcessedIds::default();
        processed.insert("r-9");
        assert!(is_duplicate(&submission("r-9", "z.jpg"), &[], &processed));
    }

    #[test]
    fn test_content_hash_is_duplicate() {
        let known = vec![submission("r-1", "a.jpg").with_content(b"receipt bytes")];
        let candidate = Submission::new("r-2", "b.jpg", 99, "sara").with_content(b"receipt bytes");
        assert!(is_duplicate(&candidate, &known, &ProcessedIds::default()));

        let different = Submission::new("r-3", "c.jpg", 99, "sara").with_content(b"other bytes");
        assert!(!is_duplicate(&different, &known, &ProcessedIds::default()));
    }

    #[test]
    fn test_content_hash_is_hex_sha256() {
        let hash = content_hash(b"abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_processed_ids_evict_oldest() {
        let mut processed = ProcessedIds::new(2);
        assert!(processed.insert("a"));
        assert!(processed.insert("b"));
        assert!(!processed.insert("b"));
        assert!(processed.insert("c"));
        assert!(!processed.contains("a"));
        assert!(processed.contains("b"));
        assert!(processed.contains("c"));
        assert_eq!(processed.len(), 2);
    }

    #[test]
    fn test_detector_registers_new_submissions() {
        let detector = DuplicateDetector::new(100);
        assert!(!detector.check_and_register(submission("r-1", "a.jpg")));
        assert!(detector.check_and_register(submission("r-1", "a.jpg")));
        assert!(!detector.check_and_register(submission("r-2", "b.jpg")));

        let stats = detector.stats();
        assert_eq!(stats.known_submissions, 2);
        assert_eq!(stats.duplicates_seen, 1);
    }

    #[test]
    fn test_forget_allows_resubmission() {
        let detector = DuplicateDetector::new(100);
        assert!(!detector.check_and_register(submission("r-1", "a.jpg")));
        detector.forget("r-1");
        assert!(!detector.is_duplicate(&submission("r-1", "a.jpg")));

        detector.mark_processed("r-1");
        assert!(detector.is_duplicate(&submission("r-1", "a.jpg")));
        assert_eq!(detector.stats().processed_ids, 1);
    }
}
