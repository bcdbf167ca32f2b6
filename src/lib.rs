//! # Receipt Intake
//!
//! Turns recognized text from Iraqi delivery receipts into a structured
//! six-field record, learns from user corrections, filters duplicate
//! submissions, and runs recognition jobs one at a time.

pub mod confidence;
pub mod config;
pub mod correction_learning;
pub mod correction_store;
pub mod deduplication;
pub mod errors;
pub mod extraction_errors;
pub mod field_extraction;
pub mod field_set;
pub mod normalization;
pub mod observability;
pub mod observability_config;
pub mod pipeline;
pub mod processing_queue;

// Re-export types for easier access
pub use config::AppConfig;
pub use correction_learning::{CorrectionLearner, LearningConfig};
pub use correction_store::{
    CorrectionEntry, CorrectionStore, InMemoryCorrectionStore, JsonFileCorrectionStore,
};
pub use deduplication::{DuplicateDetector, Submission};
pub use errors::{AppError, AppResult};
pub use field_extraction::{ExtractionConfig, FieldExtractor};
pub use field_set::{Field, FieldSet};
pub use pipeline::{ProcessedReceipt, ReceiptPipeline};
pub use processing_queue::{ProcessingQueue, QueueConfig};
