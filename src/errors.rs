//! # Application Error Types
//!
//! This module defines common error types used throughout the receipt intake pipeline.
//! It provides structured error handling for configuration, storage and queue components.

use std::fmt;

/// General application error type for consistent error handling
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Configuration validation errors
    Config(String),
    /// Validation errors (field values, identifiers, inputs)
    Validation(String),
    /// External text recognition errors
    Extraction(String),
    /// Correction log persistence errors
    Storage(String),
    /// Processing queue errors (full queue, duplicate ids, unknown retries)
    Queue(String),
    /// Internal application errors
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(msg) => write!(f, "[CONFIG] {}", msg),
            AppError::Validation(msg) => write!(f, "[VALIDATION] {}", msg),
            AppError::Extraction(msg) => write!(f, "[EXTRACTION] {}", msg),
            AppError::Storage(msg) => write!(f, "[STORAGE] {}", msg),
            AppError::Queue(msg) => write!(f, "[QUEUE] {}", msg),
            AppError::Internal(msg) => write!(f, "[INTERNAL] {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<crate::extraction_errors::ExtractionError> for AppError {
    fn from(err: crate::extraction_errors::ExtractionError) -> Self {
        AppError::Extraction(err.to_string())
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Standardized error logging utilities for consistent error reporting across the application
pub mod error_logging {
    use tracing::error;

    /// Log correction log persistence errors with path context
    pub fn log_storage_error(
        error: &impl std::fmt::Display,
        operation: &str,
        path: Option<&str>,
        entry_count: Option<usize>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            path = ?path,
            entry_count = ?entry_count,
            "Correction store operation failed"
        );
    }

    /// Log extraction job failures with queue context
    pub fn log_extraction_error(
        error: &impl std::fmt::Display,
        item_id: &str,
        processing_duration: Option<std::time::Duration>,
        queue_length: usize,
    ) {
        error!(
            error = %error,
            item_id = %item_id,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            queue_length = %queue_length,
            "Extraction job failed"
        );
    }

    /// Log validation errors with input context
    pub fn log_validation_error(
        error: &impl std::fmt::Display,
        operation: &str,
        input_type: &str,
        input_value: Option<&str>,
    ) {
        error!(
            error = %error,
            operation = %operation,
            input_type = %input_type,
            input_value = ?input_value.map(|v| if v.chars().count() > 100 {
                format!("{}...", v.chars().take(100).collect::<String>())
            } else {
                v.to_string()
            }),
            "Validation failed"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}
