use anyhow::Result;
use receipt_intake::config::AppConfig;
use receipt_intake::correction_store::{
    CorrectionStore, InMemoryCorrectionStore, JsonFileCorrectionStore,
};
use receipt_intake::deduplication::{DuplicateDetector, Submission};
use receipt_intake::errors::error_logging;
use receipt_intake::extraction_errors::ExtractionError;
use receipt_intake::observability;
use receipt_intake::pipeline::ReceiptPipeline;
use receipt_intake::processing_queue::{JobTicket, ProcessingQueue};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Load and validate configuration from the environment
fn load_configuration() -> Result<AppConfig> {
    let config = AppConfig::from_env().map_err(|e| {
        error_logging::log_config_error(&e, "environment", "load");
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    config.validate().map_err(|e| {
        error_logging::log_config_error(&e, "app_config", "validate");
        anyhow::anyhow!(
            "Configuration validation failed: {}. Please check your configuration values.",
            e
        )
    })?;

    Ok(config)
}

/// Open the correction log configured for this run
fn open_correction_store(config: &AppConfig) -> Arc<dyn CorrectionStore> {
    match &config.storage.corrections_path {
        Some(path) => Arc::new(JsonFileCorrectionStore::open(
            path,
            config.learning.max_corrections,
        )),
        None => Arc::new(InMemoryCorrectionStore::new(config.learning.max_corrections)),
    }
}

/// Describe a text file as a submission for duplicate checks
async fn describe_submission(path: &Path) -> Result<Submission> {
    let content = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let owner = env::var("USER").unwrap_or_else(|_| "unknown".to_string());

    Ok(Submission::new(
        path.display().to_string(),
        filename,
        content.len() as u64,
        owner,
    )
    .with_content(&content))
}

/// Stand-in recognition step: the file already holds recognized text
async fn recognize(path: PathBuf) -> Result<String, ExtractionError> {
    let text = tokio::fs::read_to_string(&path).await?;
    if text.trim().is_empty() {
        return Err(ExtractionError::Source(format!(
            "{} contains no text",
            path.display()
        )));
    }
    Ok(text)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = load_configuration()?;

    let metrics_handle = observability::init_observability_with_config(&config.observability)?;
    info!("{}", config.summary());

    let paths: Vec<PathBuf> = env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        return Err(anyhow::anyhow!(
            "Usage: receipt-intake <recognized-text-file>..."
        ));
    }

    let pipeline = ReceiptPipeline::new(
        config.extraction.clone(),
        config.learning.clone(),
        open_correction_store(&config),
    );
    let detector = DuplicateDetector::new(config.deduplication.processed_ids_capacity);
    let queue: ProcessingQueue<PathBuf, String> = ProcessingQueue::new(config.queue.clone());

    let mut tickets: Vec<JobTicket<String>> = Vec::new();
    for path in paths {
        let submission = match describe_submission(&path).await {
            Ok(submission) => submission,
            Err(e) => {
                error_logging::log_validation_error(
                    &e,
                    "describe_submission",
                    "path",
                    Some(&path.display().to_string()),
                );
                continue;
            }
        };

        let id = submission.id.clone();
        if detector.check_and_register(submission) {
            warn!(item_id = %id, "Skipping duplicate submission");
            continue;
        }

        let enqueued = observability::queue_span("enqueue", &id)
            .in_scope(|| queue.enqueue(id.clone(), path, recognize));
        match enqueued {
            Ok(ticket) => tickets.push(ticket),
            Err(e) => {
                warn!(item_id = %id, error = %e, "Could not enqueue item");
                detector.forget(&id);
            }
        }
    }

    let mut delivered = 0usize;
    for ticket in tickets {
        let id = ticket.id().to_string();
        let started = Instant::now();
        match ticket.wait().await {
            Ok(text) => {
                let receipt = observability::extraction_span(&id)
                    .in_scope(|| pipeline.process(&text, None));
                detector.mark_processed(&id);
                println!("{}", serde_json::to_string_pretty(&receipt)?);
                delivered += 1;
            }
            Err(e) => {
                error_logging::log_extraction_error(
                    &e,
                    &id,
                    Some(started.elapsed()),
                    queue.queue_length(),
                );
                detector.forget(&id);
            }
        }
    }

    let stats = detector.stats();
    info!(
        delivered,
        duplicates = stats.duplicates_seen,
        failed = queue.failed_ids().len(),
        "Finished processing submissions"
    );

    if let Some(handle) = metrics_handle {
        eprintln!("{}", handle.render());
    }

    Ok(())
}
