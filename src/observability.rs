//! Observability setup for structured logging and metrics.
//!
//! This module provides:
//! - Structured logging with configurable level and format
//! - Metrics collection through the Prometheus recorder
//! - Span helpers for the extraction and queue components

use anyhow::Result;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::prelude::*;

use crate::observability_config::{LogFormat, ObservabilityConfig};

/// Initialize logging and, when enabled, metrics collection
///
/// Returns the Prometheus handle so the caller can render a snapshot.
pub fn init_observability_with_config(
    config: &ObservabilityConfig,
) -> Result<Option<PrometheusHandle>> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid observability configuration: {}", e))?;

    init_tracing_with_config(config)?;

    let handle = if config.enable_metrics_export {
        Some(init_metrics_with_config(config)?)
    } else {
        None
    };

    tracing::info!(
        environment = %config.environment,
        metrics_enabled = config.enable_metrics_export,
        "Observability stack initialized successfully"
    );
    Ok(handle)
}

/// Initialize structured logging with tracing and configuration
///
/// Output goes to stderr so stdout stays free for results.
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("receipt_intake={}", config.log_level.to_ascii_lowercase()).parse()?);

    match config.effective_log_format() {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_thread_names(false),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_thread_names(true),
                )
                .try_init()?;
        }
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    tracing::info!(
        environment = %config.environment,
        "Metrics collection initialized"
    );
    Ok(handle)
}

/// Create a span for one receipt extraction
pub fn extraction_span(item_id: &str) -> tracing::Span {
    tracing::info_span!("receipt_extraction", item_id = item_id, component = "extraction")
}

/// Create a span for processing queue operations
pub fn queue_span(operation: &str, item_id: &str) -> tracing::Span {
    tracing::info_span!(
        "queue_operation",
        operation = operation,
        item_id = item_id,
        component = "queue"
    )
}
