//! # Observability Configuration
//!
//! Environment-specific settings for log output and metrics collection.

use std::env;

/// Log line encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Observability configuration for different environments
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Environment name (development, staging, production)
    pub environment: String,
    /// Log level for crate components
    pub log_level: String,
    /// Explicit log format; derived from the environment when unset
    pub log_format: Option<LogFormat>,
    /// Whether to install the Prometheus recorder
    pub enable_metrics_export: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: None,
            enable_metrics_export: true,
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl ObservabilityConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT")
                .ok()
                .and_then(|raw| LogFormat::parse(&raw)),
            enable_metrics_export: env::var("ENABLE_METRICS_EXPORT")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    /// Check if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Pretty in development, JSON elsewhere, unless set explicitly
    pub fn effective_log_format(&self) -> LogFormat {
        self.log_format.unwrap_or(if self.is_development() {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(format!("Invalid log level: {}", self.log_level));
        }
        if self.environment.trim().is_empty() {
            return Err("Environment name cannot be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.environment, "development");
        assert_eq!(config.log_level, "info");
        assert!(config.enable_metrics_export);
        assert_eq!(config.effective_log_format(), LogFormat::Pretty);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ObservabilityConfig::default();
        assert!(config.validate().is_ok());

        config.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.log_level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.environment = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_format_follows_environment() {
        let mut config = ObservabilityConfig {
            environment: "production".to_string(),
            ..Default::default()
        };
        assert!(!config.is_development());
        assert_eq!(config.effective_log_format(), LogFormat::Json);

        config.log_format = Some(LogFormat::Pretty);
        assert_eq!(config.effective_log_format(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(LogFormat::parse("Pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse(" json "), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("xml"), None);
    }
}
