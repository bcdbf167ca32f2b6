#[cfg(test)]
mod tests {
    use receipt_intake::config::AppConfig;
    use receipt_intake::errors::AppError;
    use std::time::Duration;

    // Environment variables are process-wide, so every case lives in one test
    #[test]
    fn test_from_env_overrides_and_rejects_garbage() {
        std::env::set_var("USD_EXCHANGE_RATE", "1310");
        std::env::set_var("LEARNING_DOCUMENT_THRESHOLD", "0.5");
        std::env::set_var("MAX_CORRECTIONS", "50");
        std::env::set_var("QUEUE_COOLDOWN_MS", "250");
        std::env::set_var("CORRECTIONS_PATH", "/tmp/receipt-corrections.json");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.extraction.usd_exchange_rate, 1310.0);
        assert_eq!(config.learning.document_similarity_threshold, 0.5);
        assert_eq!(config.learning.field_similarity_threshold, 0.7);
        assert_eq!(config.learning.max_corrections, 50);
        assert_eq!(config.queue.cooldown, Duration::from_millis(250));
        assert!(config.storage.corrections_path.is_some());
        assert!(config.validate().is_ok());

        std::env::set_var("MAX_CORRECTIONS", "lots");
        assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));

        for key in [
            "USD_EXCHANGE_RATE",
            "LEARNING_DOCUMENT_THRESHOLD",
            "MAX_CORRECTIONS",
            "QUEUE_COOLDOWN_MS",
            "CORRECTIONS_PATH",
        ] {
            std::env::remove_var(key);
        }

        let defaults = AppConfig::from_env().unwrap();
        assert_eq!(defaults.extraction.usd_exchange_rate, 1500.0);
        assert!(defaults.storage.corrections_path.is_none());
    }
}
