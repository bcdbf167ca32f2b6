#[cfg(test)]
mod tests {
    use receipt_intake::correction_learning::{CorrectionLearner, LearningConfig};
    use receipt_intake::correction_store::{
        CorrectionStore, InMemoryCorrectionStore, JsonFileCorrectionStore,
    };
    use receipt_intake::field_extraction::ExtractionConfig;
    use receipt_intake::field_set::FieldSet;
    use receipt_intake::pipeline::ReceiptPipeline;
    use std::sync::Arc;

    const RECEIPT: &str = "شركة الوسيط\nكود: 7788\nاسم المرسل: محمد\nالمحافظة: بصره";

    fn code_fields(code: &str) -> FieldSet {
        FieldSet {
            code: code.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_correction_round_trip() {
        let pipeline = ReceiptPipeline::new(
            ExtractionConfig::default(),
            LearningConfig::default(),
            Arc::new(InMemoryCorrectionStore::default()),
        );

        let delivered = pipeline.process(RECEIPT, None);
        assert_eq!(delivered.fields.sender_name, "محمد");

        let mut edited = delivered.fields.clone();
        edited.sender_name = "محمد جاسم".to_string();
        assert!(pipeline
            .commit_edit(RECEIPT, &delivered.fields, &edited)
            .unwrap());

        let again = pipeline.process(RECEIPT, None);
        assert_eq!(again.fields, edited);
    }

    #[test]
    fn test_zero_word_overlap_leaves_record_untouched() {
        let learner = CorrectionLearner::new(
            Arc::new(InMemoryCorrectionStore::default()),
            LearningConfig::default(),
        );
        learner
            .record_correction("alpha beta gamma", &code_fields("111"), &code_fields("999"))
            .unwrap();

        let extracted = code_fields("111");
        assert_eq!(learner.enhance("delta epsilon", &extracted), extracted);
        assert_eq!(learner.enhance("alpha beta gamma", &extracted).code, "999");
    }

    #[test]
    fn test_document_threshold_is_exclusive() {
        let learner = CorrectionLearner::new(
            Arc::new(InMemoryCorrectionStore::default()),
            LearningConfig {
                document_similarity_threshold: 0.5,
                ..Default::default()
            },
        );
        learner
            .record_correction("a b c", &code_fields("111"), &code_fields("999"))
            .unwrap();

        // {a, b, c} vs {a, b, d}: 2 shared of 4 distinct words
        assert_eq!(learner.enhance("a b d", &code_fields("111")).code, "111");
        assert_eq!(learner.enhance("a b c", &code_fields("111")).code, "999");
    }

    #[test]
    fn test_oldest_correction_evicted_at_capacity() {
        let store = Arc::new(InMemoryCorrectionStore::new(100));
        let learner = CorrectionLearner::new(store.clone(), LearningConfig::default());

        for i in 0..101 {
            let text = format!("w{i}a w{i}b");
            learner
                .record_correction(&text, &code_fields("111"), &code_fields("999"))
                .unwrap();
        }

        assert_eq!(store.len(), 100);
        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].source_text, "w1a w1b");
        assert_eq!(snapshot[99].source_text, "w100a w100b");

        assert_eq!(learner.enhance("w0a w0b", &code_fields("111")).code, "111");
        assert_eq!(learner.enhance("w100a w100b", &code_fields("111")).code, "999");
    }

    #[test]
    fn test_corrections_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrections.json");

        {
            let store = Arc::new(JsonFileCorrectionStore::open(&path, 100));
            let learner = CorrectionLearner::new(store, LearningConfig::default());
            learner
                .record_correction(RECEIPT, &code_fields("7788"), &code_fields("7789"))
                .unwrap();
        }

        let reopened = Arc::new(JsonFileCorrectionStore::open(&path, 100));
        assert_eq!(reopened.len(), 1);
        let learner = CorrectionLearner::new(reopened, LearningConfig::default());
        assert_eq!(learner.enhance(RECEIPT, &code_fields("7788")).code, "7789");
    }
}
