//! # Unified Application Configuration
//!
//! This module provides a centralized configuration system that consolidates
//! all application settings into a single, structured configuration object.
//! It supports loading from environment variables, validation, and provides
//! a clean interface for accessing configuration throughout the application.

use crate::correction_learning::LearningConfig;
use crate::errors::{AppError, AppResult};
use crate::field_extraction::ExtractionConfig;
use crate::observability_config::ObservabilityConfig;
use crate::processing_queue::QueueConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Correction log storage settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the correction log; in-memory when unset
    pub corrections_path: Option<PathBuf>,
}

impl StorageConfig {
    /// Validate storage configuration
    pub fn validate(&self) -> AppResult<()> {
        if let Some(path) = &self.corrections_path {
            if path.as_os_str().is_empty() {
                return Err(AppError::Config(
                    "Corrections path cannot be empty".to_string(),
                ));
            }
            if path.is_dir() {
                return Err(AppError::Config(format!(
                    "Corrections path {} is a directory",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Duplicate detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeduplicationConfig {
    /// Number of processed ids remembered
    pub processed_ids_capacity: usize,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        Self {
            processed_ids_capacity: 10_000,
        }
    }
}

impl DeduplicationConfig {
    /// Validate deduplication configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.processed_ids_capacity == 0 {
            return Err(AppError::Config(
                "Processed ids capacity cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Field extraction configuration
    pub extraction: ExtractionConfig,
    /// Correction learning configuration
    pub learning: LearningConfig,
    /// Processing queue configuration
    pub queue: QueueConfig,
    /// Duplicate detection configuration
    pub deduplication: DeduplicationConfig,
    /// Correction log storage configuration
    pub storage: StorageConfig,
    /// Observability configuration
    pub observability: ObservabilityConfig,
}

/// Parse an optional environment variable, keeping `default` when unset
fn env_or<T: FromStr>(key: &str, default: T) -> AppResult<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{} must be a valid number", key))),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Extraction
        config.extraction.usd_exchange_rate =
            env_or("USD_EXCHANGE_RATE", config.extraction.usd_exchange_rate)?;

        // Learning
        config.learning.document_similarity_threshold = env_or(
            "LEARNING_DOCUMENT_THRESHOLD",
            config.learning.document_similarity_threshold,
        )?;
        config.learning.field_similarity_threshold = env_or(
            "LEARNING_FIELD_THRESHOLD",
            config.learning.field_similarity_threshold,
        )?;
        config.learning.max_corrections =
            env_or("MAX_CORRECTIONS", config.learning.max_corrections)?;

        // Queue
        let cooldown_ms = env_or("QUEUE_COOLDOWN_MS", config.queue.cooldown.as_millis() as u64)?;
        config.queue.cooldown = Duration::from_millis(cooldown_ms);
        config.queue.max_pending = env_or("QUEUE_MAX_PENDING", config.queue.max_pending)?;

        // Deduplication
        config.deduplication.processed_ids_capacity = env_or(
            "PROCESSED_IDS_CAPACITY",
            config.deduplication.processed_ids_capacity,
        )?;

        // Storage
        config.storage.corrections_path = env::var("CORRECTIONS_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        // Observability
        config.observability = ObservabilityConfig::from_env();

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.extraction.validate()?;
        self.learning.validate()?;
        self.queue.validate()?;
        self.deduplication.validate()?;
        self.storage.validate()?;
        self.observability
            .validate()
            .map_err(AppError::Config)?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: usd_exchange_rate={}, document_threshold={}, field_threshold={}, max_corrections={}, queue_cooldown_ms={}, corrections_path={}, environment={}",
            self.extraction.usd_exchange_rate,
            self.learning.document_similarity_threshold,
            self.learning.field_similarity_threshold,
            self.learning.max_corrections,
            self.queue.cooldown.as_millis(),
            self.storage
                .corrections_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "[memory]".to_string()),
            self.observability.environment
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.learning.max_corrections, 100);
        assert_eq!(config.queue.cooldown, Duration::from_millis(1000));
    }

    #[test]
    fn test_invalid_sections_are_rejected() {
        let mut config = AppConfig::default();
        config.learning.field_similarity_threshold = -0.1;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.deduplication.processed_ids_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.extraction.usd_exchange_rate = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_path_cannot_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig {
            corrections_path: Some(dir.path().to_path_buf()),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_mentions_storage() {
        let config = AppConfig::default();
        assert!(config.summary().contains("[memory]"));
    }
}
