//! # Receipt Pipeline
//!
//! Composes extraction, correction learning and confidence scoring into one
//! call per recognized receipt, and routes committed edits back to the learner.

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::confidence;
use crate::correction_learning::{CorrectionLearner, LearningConfig};
use crate::correction_store::CorrectionStore;
use crate::errors::AppResult;
use crate::field_extraction::{ExtractionConfig, FieldExtractor};
use crate::field_set::{Field, FieldSet};

/// A delivered record with its confidence estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReceipt {
    pub fields: FieldSet,
    pub confidence: u8,
}

/// One field changed by a user edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: Field,
    pub before: String,
    pub after: String,
}

/// List the per-field differences between two records
pub fn field_changes(before: &FieldSet, after: &FieldSet) -> Vec<FieldChange> {
    before
        .changed_fields(after)
        .into_iter()
        .map(|field| FieldChange {
            field,
            before: before.get(field).to_string(),
            after: after.get(field).to_string(),
        })
        .collect()
}

/// Extraction, learning and scoring for recognized receipt text
pub struct ReceiptPipeline {
    extractor: FieldExtractor,
    learner: CorrectionLearner,
}

impl ReceiptPipeline {
    pub fn new(
        extraction: ExtractionConfig,
        learning: LearningConfig,
        store: Arc<dyn CorrectionStore>,
    ) -> Self {
        Self {
            extractor: FieldExtractor::with_config(extraction),
            learner: CorrectionLearner::new(store, learning),
        }
    }

    pub fn learner(&self) -> &CorrectionLearner {
        &self.learner
    }

    pub fn extractor(&self) -> &FieldExtractor {
        &self.extractor
    }

    /// Extract, adjust from past corrections and score one receipt
    pub fn process(
        &self,
        text: &str,
        fragment: Option<&HashMap<String, String>>,
    ) -> ProcessedReceipt {
        let extracted = self.extractor.extract_with_fragment(text, fragment);
        let fields = self.learner.enhance(text, &extracted);
        let confidence = confidence::score(&fields);

        counter!("receipt_extractions_total").increment(1);
        histogram!("receipt_confidence_score").record(f64::from(confidence));
        for (field, value) in fields.iter() {
            if value.is_empty() {
                counter!("receipt_fields_missing_total", "field" => field.key()).increment(1);
            }
        }

        debug!(
            adjusted_fields = extracted.changed_fields(&fields).len(),
            "Applied learned corrections"
        );
        info!(
            populated = fields.populated_count(),
            confidence,
            "Processed receipt"
        );

        ProcessedReceipt { fields, confidence }
    }

    /// Record a committed user edit of a delivered record
    ///
    /// Returns false when the edit changed nothing.
    pub fn commit_edit(&self, text: &str, before: &FieldSet, after: &FieldSet) -> AppResult<bool> {
        self.learner.record_correction(text, before, after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction_store::InMemoryCorrectionStore;

    fn pipeline() -> ReceiptPipeline {
        ReceiptPipeline::new(
            ExtractionConfig::default(),
            LearningConfig::default(),
            Arc::new(InMemoryCorrectionStore::default()),
        )
    }

    #[test]
    fn test_field_changes() {
        let before = FieldSet {
            price: "5000".to_string(),
            ..Default::default()
        };
        let after = FieldSet {
            price: "7000".to_string(),
            ..Default::default()
        };
        let changes = field_changes(&before, &after);
        assert_eq!(
            changes,
            vec![FieldChange {
                field: Field::Price,
                before: "5000".to_string(),
                after: "7000".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_text_gives_empty_record() {
        let receipt = pipeline().process("", None);
        assert!(receipt.fields.is_empty());
        assert_eq!(receipt.confidence, 0);
    }

    #[test]
    fn test_commit_edit_feeds_learner() {
        let pipeline = pipeline();
        let text = "وصل رقم الوصل: 4455\nاسم المرسل: علي";
        let delivered = pipeline.process(text, None);

        let mut edited = delivered.fields.clone();
        edited.sender_name = "علي حسين".to_string();
        assert!(pipeline.commit_edit(text, &delivered.fields, &edited).unwrap());
        assert!(!pipeline.commit_edit(text, &edited, &edited).unwrap());

        let again = pipeline.process(text, None);
        assert_eq!(again.fields.sender_name, "علي حسين");
    }
}
