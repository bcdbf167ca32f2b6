//! # Extraction Error Types Module
//!
//! Error types reported by extraction jobs running through the processing queue.
//! The queue treats every variant as an ordinary failure.

/// Custom error types for extraction jobs
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The external recognition call failed
    Source(String),
    /// The external recognition call timed out
    Timeout(String),
    /// The item was discarded before it started
    Cancelled(String),
    /// The job panicked while executing
    Panicked(String),
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::Source(msg) => {
                write!(f, "[EXTRACT_SOURCE] Text recognition failed: {}", msg)
            }
            ExtractionError::Timeout(msg) => {
                write!(f, "[EXTRACT_TIMEOUT] Text recognition timed out: {}", msg)
            }
            ExtractionError::Cancelled(msg) => {
                write!(f, "[EXTRACT_CANCELLED] Item discarded before processing: {}", msg)
            }
            ExtractionError::Panicked(msg) => {
                write!(f, "[EXTRACT_PANIC] Extraction job panicked: {}", msg)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

impl From<anyhow::Error> for ExtractionError {
    fn from(err: anyhow::Error) -> Self {
        ExtractionError::Source(err.to_string())
    }
}

impl From<std::io::Error> for ExtractionError {
    fn from(err: std::io::Error) -> Self {
        ExtractionError::Source(err.to_string())
    }
}
