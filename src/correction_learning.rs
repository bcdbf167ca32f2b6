//! # Correction Learning Module
//!
//! Remembers user edits and nudges later extractions of similar text toward the
//! corrected values.
//!
//! ## Retrieval
//!
//! For every stored correction, in storage order:
//!
//! ```text
//! word_jaccard(text, entry.source_text) > document threshold (0.4)
//!   for each field the entry corrected:
//!     char_jaccard(extracted[field], entry.original[field]) > field threshold (0.7)
//!       extracted[field] = entry.corrected[field]
//! ```
//!
//! Later qualifying entries overwrite earlier ones. The store holds at most a
//! few hundred entries, so each call is a linear scan over a snapshot.

use metrics::counter;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, info};

use crate::correction_store::{CorrectionEntry, CorrectionStore, DEFAULT_MAX_CORRECTIONS};
use crate::errors::{AppError, AppResult};
use crate::field_set::FieldSet;

/// Configuration for correction retrieval
#[derive(Debug, Clone)]
pub struct LearningConfig {
    /// Minimum word overlap between receipts, exclusive
    pub document_similarity_threshold: f64,
    /// Minimum character overlap between field values, exclusive
    pub field_similarity_threshold: f64,
    /// Capacity of the correction log
    pub max_corrections: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            document_similarity_threshold: 0.4,
            field_similarity_threshold: 0.7,
            max_corrections: DEFAULT_MAX_CORRECTIONS,
        }
    }
}

impl LearningConfig {
    /// Validate learning configuration parameters
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            (
                "document_similarity_threshold",
                self.document_similarity_threshold,
            ),
            ("field_similarity_threshold", self.field_similarity_threshold),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "{} must be in [0.0, 1.0), got {}",
                    name, value
                )));
            }
        }

        if self.max_corrections == 0 {
            return Err(AppError::Config(
                "max_corrections must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Jaccard similarity of two sets; two empty sets are identical
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Case-insensitive whitespace-token Jaccard similarity
pub fn word_similarity(a: &str, b: &str) -> f64 {
    let words = |text: &str| -> HashSet<String> {
        text.to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    };
    jaccard(&words(a), &words(b))
}

/// Case-insensitive character-set Jaccard similarity
pub fn char_similarity(a: &str, b: &str) -> f64 {
    let chars = |text: &str| -> HashSet<char> { text.to_lowercase().chars().collect() };
    jaccard(&chars(a), &chars(b))
}

/// Learns from committed edits and applies them to new extractions
pub struct CorrectionLearner {
    store: Arc<dyn CorrectionStore>,
    config: LearningConfig,
}

impl CorrectionLearner {
    /// Create a learner over an injected store
    pub fn new(store: Arc<dyn CorrectionStore>, config: LearningConfig) -> Self {
        info!(
            stored = store.len(),
            capacity = store.capacity(),
            document_threshold = config.document_similarity_threshold,
            field_threshold = config.field_similarity_threshold,
            "Creating CorrectionLearner"
        );
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn CorrectionStore> {
        &self.store
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// Record a committed edit
    ///
    /// Returns `Ok(false)` without touching the store when nothing changed.
    pub fn record_correction(
        &self,
        text: &str,
        before: &FieldSet,
        after: &FieldSet,
    ) -> AppResult<bool> {
        let Some(entry) = CorrectionEntry::new(text, before.clone(), after.clone()) else {
            debug!("Ignoring edit without changes");
            return Ok(false);
        };

        let changed = before.changed_fields(after);
        self.store.append(entry)?;
        counter!("receipt_corrections_recorded_total").increment(1);
        info!(
            changed_fields = ?changed.iter().map(|f| f.key()).collect::<Vec<_>>(),
            stored = self.store.len(),
            "Recorded correction"
        );
        Ok(true)
    }

    /// Apply similar past corrections to a fresh extraction
    ///
    /// `extracted` is not modified; the adjusted record is returned.
    pub fn enhance(&self, text: &str, extracted: &FieldSet) -> FieldSet {
        let mut enhanced = extracted.clone();

        for entry in self.store.snapshot() {
            let document_similarity = word_similarity(text, &entry.source_text);
            if document_similarity <= self.config.document_similarity_threshold {
                continue;
            }

            for field in entry.original_fields.changed_fields(&entry.corrected_fields) {
                let field_similarity =
                    char_similarity(extracted.get(field), entry.original_fields.get(field));
                if field_similarity > self.config.field_similarity_threshold {
                    let corrected = entry.corrected_fields.get(field);
                    debug!(
                        field = %field,
                        document_similarity,
                        field_similarity,
                        from = %enhanced.get(field),
                        to = %corrected,
                        "Applying learned correction"
                    );
                    enhanced.set(field, corrected);
                    counter!("receipt_corrections_applied_total", "field" => field.key())
                        .increment(1);
                }
            }
        }

        enhanced
    }
}
