#[suitest::suite(chat_tests)]
#[suitest::suite_cfg(sequential = true)]
mod chat_service_tests {
    use crate::{
        app::{
            state::AppState,
            test::{TestState, FAKE_ANSWER},
        },
        core::{
            llm::Role,
            prompt::PromptTemplate,
            service::{
                chat::dto::{ChatPayload, SearchPayload},
                MAX_QUESTION_LENGTH,
            },
        },
        error::MedragErr,
    };
    use suitest::{after_all, before_all};

    const TEST_DOCS_PATH: &str = "__chat_service_test_docs__";

    const FEVER: &str = "Fever is a temporary increase in body temperature.";
    const ACNE: &str = "Acne occurs when hair follicles become plugged with oil and dead skin cells.";
    const ANEMIA: &str = "Anemia means the blood lacks enough healthy red blood cells.";
    const MIGRAINE: &str = "A migraine is a headache that causes severe throbbing pain.";

    #[before_all]
    async fn setup() -> TestState {
        let test_state = TestState::init(TEST_DOCS_PATH).await;

        test_state.write_document("fever.txt", FEVER).await;
        test_state.write_document("acne.txt", ACNE).await;
        test_state.write_document("anemia.txt", ANEMIA).await;
        test_state.write_document("migraine.txt", MIGRAINE).await;

        let ingest = test_state.app().services.ingest;
        for source in ingest.list_sources().await.unwrap() {
            let outcome = ingest.ingest_document(&source, false).await.unwrap();
            assert_eq!(1, outcome.total_chunks);
        }

        test_state
    }

    #[after_all]
    async fn teardown() {
        let _ = tokio::fs::remove_dir_all(TEST_DOCS_PATH).await;
    }

    #[test]
    async fn search_ranks_most_similar_first(state: TestState) {
        let chat = state.app().services.chat;

        let results = chat
            .search(SearchPayload::new(ACNE, Some(4)))
            .await
            .unwrap();

        assert_eq!(4, results.len());
        assert_eq!("acne.txt", results[0].chunk.source);
        assert_eq!(ACNE, results[0].chunk.content);
        assert!((results[0].score - 1.0).abs() < 1e-4);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    async fn search_limits_results(state: TestState) {
        let chat = state.app().services.chat;

        let results = chat.search(SearchPayload::new("fever", None)).await.unwrap();
        assert_eq!(state.settings.top_k as usize, results.len());

        let results = chat.search(SearchPayload::new("fever", Some(1))).await.unwrap();
        assert_eq!(1, results.len());
    }

    #[test]
    async fn answers_with_retrieved_context(state: TestState) {
        let chat = state.app().services.chat;

        let mut payload = ChatPayload::new(format!("  {MIGRAINE}  "));
        payload.top_k = Some(2);

        let response = chat.answer(payload).await.unwrap();

        assert_eq!(FAKE_ANSWER, response.answer);
        assert_eq!("fake-llm", response.model);
        assert_eq!(2, response.sources.len());
        assert_eq!("migraine.txt", response.sources[0].chunk.source);

        let conversation = state.llm.last_conversation().unwrap();
        assert_eq!(2, conversation.len());

        assert_eq!(Role::System, conversation[0].role);
        assert!(conversation[0].content.contains(MIGRAINE));
        assert!(!conversation[0].content.contains("{context}"));

        // Question is trimmed before it reaches the model
        assert_eq!(Role::User, conversation[1].role);
        assert_eq!(MIGRAINE, conversation[1].content);
    }

    #[test]
    async fn rejects_invalid_input(state: TestState) {
        let chat = state.app().services.chat;

        let err = chat.answer(ChatPayload::new("   ")).await.unwrap_err();
        assert!(matches!(err.error, MedragErr::Validation(_)));

        let mut payload = ChatPayload::new("What is acne?");
        payload.top_k = Some(0);
        let err = chat.answer(payload).await.unwrap_err();
        assert!(matches!(err.error, MedragErr::Validation(_)));

        let mut payload = ChatPayload::new("What is acne?");
        payload.top_k = Some(21);
        let err = chat.answer(payload).await.unwrap_err();
        assert!(matches!(err.error, MedragErr::Validation(_)));

        let question = "a".repeat(MAX_QUESTION_LENGTH as usize + 1);
        let err = chat.answer(ChatPayload::new(question)).await.unwrap_err();
        assert!(matches!(err.error, MedragErr::Validation(_)));

        let err = chat
            .search(SearchPayload::new("acne", Some(0)))
            .await
            .unwrap_err();
        assert!(matches!(err.error, MedragErr::Validation(_)));

        let err = chat.search(SearchPayload::new("", None)).await.unwrap_err();
        assert!(matches!(err.error, MedragErr::Validation(_)));
    }

    #[test]
    async fn answers_without_context(state: TestState) {
        let mut settings = state.settings.clone();
        settings.collection = "empty-collection".to_string();

        let app = AppState::new_test(
            state.providers.clone(),
            settings,
            PromptTemplate::default(),
        );

        // Missing collection
        let err = app
            .services
            .chat
            .answer(ChatPayload::new("What is a fever?"))
            .await
            .unwrap_err();
        assert!(matches!(err.error, MedragErr::DoesNotExist(_)));

        app.services.ingest.ensure_collection().await.unwrap();

        let response = app
            .services
            .chat
            .answer(ChatPayload::new("What is a fever?"))
            .await
            .unwrap();

        assert_eq!(FAKE_ANSWER, response.answer);
        assert!(response.sources.is_empty());
    }

    #[test]
    async fn missing_llm_is_reported(state: TestState) {
        let mut settings = state.settings.clone();
        settings.llm_provider = "missing".to_string();

        let app = AppState::new_test(
            state.providers.clone(),
            settings,
            PromptTemplate::default(),
        );

        let err = app
            .services
            .chat
            .answer(ChatPayload::new("What is a fever?"))
            .await
            .unwrap_err();
        assert!(matches!(err.error, MedragErr::InvalidProvider(_)));
    }
}
