#[suitest::suite(ingest_tests)]
#[suitest::suite_cfg(sequential = true)]
mod ingest_service_tests {
    use crate::{
        app::{
            batch::{IngestJob, JobResult},
            state::AppProviderState,
            test::{FlakyEmbedder, TestState, FAKE_EMBEDDING_SIZE},
        },
        core::{
            chunk::ChunkConfig,
            document::{parser::ParseConfig, sha256},
            model::DocumentType,
            prompt::PromptTemplate,
            provider::ProviderFactory,
            service::ingest::dto::ChunkPreviewPayload,
            vector::VectorDb,
        },
        error::MedragErr,
    };
    use std::sync::Arc;
    use suitest::{after_all, before_all};

    const TEST_DOCS_PATH: &str = "__ingest_service_test_docs__";

    const ANEMIA: &str = "Anemia is a condition in which the blood lacks healthy red blood cells. \
        Iron deficiency is the most common cause.\n\n\
        Symptoms include fatigue, pale skin and shortness of breath. \
        Treatment depends on the cause and may include iron supplements.\n\n\
        Severe cases may require blood transfusions.";

    const ACNE: &str = "Acne is a skin condition that occurs when hair follicles become \
        plugged with oil and dead skin cells.\n\n\
        It causes whiteheads, blackheads or pimples and is most common among teenagers.";

    #[before_all]
    async fn setup() -> TestState {
        let test_state = TestState::init(TEST_DOCS_PATH).await;
        test_state
    }

    #[after_all]
    async fn teardown() {
        let _ = tokio::fs::remove_dir_all(TEST_DOCS_PATH).await;
    }

    async fn count(state: &TestState, source: &str, hash: Option<&str>) -> usize {
        state
            .providers
            .vector
            .get_provider("memory")
            .unwrap()
            .count_vectors(&state.settings.collection, source, hash)
            .await
            .unwrap()
    }

    #[test]
    async fn creates_collection_with_model_dimension(state: TestState) {
        let app = state.app();

        let collection = app.services.ingest.ensure_collection().await.unwrap();

        assert_eq!("medical-chatbot", collection.name);
        assert_eq!(FAKE_EMBEDDING_SIZE, collection.size);

        // Existing collection with the same dimension is reused
        let again = app.services.ingest.ensure_collection().await.unwrap();
        assert_eq!(collection, again);
    }

    #[test]
    async fn lists_supported_documents(state: TestState) {
        state.write_document("anemia.txt", ANEMIA).await;
        state.write_document("acne.md", ACNE).await;
        state.write_document("notes.docx", "not supported").await;

        let app = state.app();
        let sources = app.services.ingest.list_sources().await.unwrap();
        let names = sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();

        assert!(names.contains(&"acne.md"));
        assert!(names.contains(&"anemia.txt"));
        assert!(!names.contains(&"notes.docx"));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(sources.iter().all(|s| s.ty == DocumentType::Text));

        let err = app.services.ingest.get_source("notes.docx").await.unwrap_err();
        assert!(matches!(err.error, MedragErr::UnsupportedFileType(_)));

        let err = app.services.ingest.get_source("../Cargo.toml").await.unwrap_err();
        assert!(matches!(err.error, MedragErr::InvalidFileName(_)));
    }

    #[test]
    async fn skips_unchanged_documents(state: TestState) {
        state.write_document("anemia.txt", ANEMIA).await;

        let ingest = state.app().services.ingest;
        let source = ingest.get_source("anemia.txt").await.unwrap();

        let first = ingest.ingest_document(&source, false).await.unwrap();
        assert!(!first.skipped);
        assert!(first.total_chunks > 1);
        assert_eq!(sha256(ANEMIA.as_bytes()), first.hash);
        assert_eq!(
            first.total_chunks,
            count(&state, "anemia.txt", Some(&first.hash)).await
        );

        let second = ingest.ingest_document(&source, false).await.unwrap();
        assert!(second.skipped);
        assert_eq!(first.total_chunks, second.total_chunks);
        assert_eq!(first.hash, second.hash);

        // Forced re-ingestion does not duplicate entries
        let forced = ingest.ingest_document(&source, true).await.unwrap();
        assert!(!forced.skipped);
        assert_eq!(first.total_chunks, forced.total_chunks);
        assert_eq!(
            first.total_chunks,
            count(&state, "anemia.txt", None).await
        );
    }

    #[test]
    async fn reindexes_partially_indexed_documents(state: TestState) {
        let content = [ANEMIA, ANEMIA, ANEMIA].join("\n\n");
        state.write_document("partial.txt", &content).await;

        let mut embedding = (*state.providers.embedding).clone();
        let flaky = Arc::new(FlakyEmbedder::new(3));
        embedding.register(FlakyEmbedder::ID, flaky);

        let providers = AppProviderState {
            embedding: Arc::new(embedding),
            ..state.providers.clone()
        };

        let mut settings = state.settings.clone();
        settings.embedding_provider = FlakyEmbedder::ID.to_string();

        let ingest = crate::app::state::AppState::new_test(
            providers,
            settings,
            PromptTemplate::default(),
        )
        .services
        .ingest;

        let source = ingest.get_source("partial.txt").await.unwrap();

        // Third batch fails after two batches were indexed
        let err = ingest.ingest_document(&source, false).await.unwrap_err();
        assert!(matches!(err.error, MedragErr::Upstream { status: 503, .. }));

        let hash = sha256(content.as_bytes());
        let partial = count(&state, "partial.txt", Some(&hash)).await;
        assert_eq!(2 * state.settings.embed_batch_size, partial);

        let healed = ingest.ingest_document(&source, false).await.unwrap();
        assert!(!healed.skipped);
        assert!(healed.total_chunks > partial);
        assert_eq!(
            healed.total_chunks,
            count(&state, "partial.txt", None).await
        );

        let again = ingest.ingest_document(&source, false).await.unwrap();
        assert!(again.skipped);
        assert_eq!(healed.total_chunks, again.total_chunks);
    }

    #[test]
    async fn modified_documents_replace_entries(state: TestState) {
        state.write_document("acne.md", ACNE).await;

        let ingest = state.app().services.ingest;
        let source = ingest.get_source("acne.md").await.unwrap();
        let old = ingest.ingest_document(&source, false).await.unwrap();

        let updated = format!("{ACNE}\n\nTreatments include topical retinoids and antibiotics.");
        state.write_document("acne.md", &updated).await;

        let source = ingest.get_source("acne.md").await.unwrap();
        let new = ingest.ingest_document(&source, false).await.unwrap();

        assert!(!new.skipped);
        assert_ne!(old.hash, new.hash);
        assert_eq!(0, count(&state, "acne.md", Some(&old.hash)).await);
        assert_eq!(new.total_chunks, count(&state, "acne.md", None).await);
    }

    #[test]
    async fn empty_documents_index_nothing(state: TestState) {
        state.write_document("empty.txt", "   \n\n  ").await;

        let ingest = state.app().services.ingest;
        let source = ingest.get_source("empty.txt").await.unwrap();
        let outcome = ingest.ingest_document(&source, false).await.unwrap();

        assert_eq!(0, outcome.total_chunks);
        assert_eq!(0, count(&state, "empty.txt", None).await);
    }

    #[test]
    async fn removes_document_entries(state: TestState) {
        state.write_document("removed.txt", ANEMIA).await;

        let ingest = state.app().services.ingest;
        let source = ingest.get_source("removed.txt").await.unwrap();
        ingest.ingest_document(&source, false).await.unwrap();

        ingest.remove_document("removed.txt").await.unwrap();
        assert_eq!(0, count(&state, "removed.txt", None).await);

        // Document stays in the store
        ingest.get_source("removed.txt").await.unwrap();

        let err = ingest.remove_document("removed.txt").await.unwrap_err();
        assert!(matches!(err.error, MedragErr::DoesNotExist(_)));
    }

    #[test]
    async fn previews_chunks(state: TestState) {
        state.write_document("preview.txt", ANEMIA).await;

        let ingest = state.app().services.ingest;

        let chunks = ingest
            .chunk_preview(ChunkPreviewPayload {
                name: "preview.txt".to_string(),
                parser: None,
                chunker: Some(ChunkConfig::sliding(100, 0).unwrap()),
            })
            .await
            .unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(i, chunk.index);
            assert_eq!("preview.txt", chunk.source);
            assert!(chunk.content.chars().count() <= 100);
        }

        // Preview does not index anything
        assert_eq!(0, count(&state, "preview.txt", None).await);

        let err = ingest
            .chunk_preview(ChunkPreviewPayload {
                name: "preview.txt".to_string(),
                parser: Some(ParseConfig::new(0, 0)),
                chunker: Some(ChunkConfig::Sliding(crate::core::chunk::SlidingWindowConfig {
                    size: 10,
                    overlap: 10,
                })),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.error, MedragErr::Chunker(_)));

        let err = ingest
            .chunk_preview(ChunkPreviewPayload {
                name: "missing.txt".to_string(),
                parser: None,
                chunker: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.error, MedragErr::DoesNotExist(_)));
    }

    #[test]
    async fn rejects_model_with_different_dimension(state: TestState) {
        let ingest = state.app().services.ingest;
        ingest.ensure_collection().await.unwrap();

        let mut settings = state.settings.clone();
        settings.embedding_model = "bag-of-words-small".to_string();

        let app = crate::app::state::AppState::new_test(
            state.providers.clone(),
            settings.clone(),
            PromptTemplate::default(),
        );

        let err = app.services.ingest.ensure_collection().await.unwrap_err();
        assert!(matches!(err.error, MedragErr::InvalidEmbeddingModel(_)));

        settings.embedding_model = "unknown".to_string();

        let app = crate::app::state::AppState::new_test(
            state.providers.clone(),
            settings,
            PromptTemplate::default(),
        );

        let err = app.services.ingest.ensure_collection().await.unwrap_err();
        assert!(matches!(err.error, MedragErr::InvalidEmbeddingModel(_)));
    }

    #[test]
    async fn executor_reports_per_document(state: TestState) {
        state.write_document("job.txt", ACNE).await;

        let app = state.app();
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);

        let job = IngestJob::new(
            false,
            Some(vec!["job.txt".to_string(), "missing.txt".to_string()]),
            tx,
        );
        app.ingest_executor.send(job).await.unwrap();

        let mut reports = vec![];
        let mut errors = vec![];

        while let Some(result) = rx.recv().await {
            match result {
                JobResult::Ok(report) => reports.push(report),
                JobResult::Err(e) => errors.push(e),
            }
        }

        assert_eq!(1, reports.len());
        assert_eq!(1, errors.len());
        assert!(matches!(errors[0].error, MedragErr::DoesNotExist(_)));

        let report = &reports[0];
        assert_eq!("job.txt", report.source);
        assert_eq!("medical-chatbot", report.collection);
        assert_eq!("memory", report.vector_db);
        assert_eq!("bag-of-words", report.model_used);
        assert!(!report.skipped);
        assert!(report.total_chunks > 0);
        assert!(report.started_at <= report.finished_at);
    }
}
