use crate::{
    core::{
        model::{ChatResponse, ScoredChunk},
        prompt::PromptTemplate,
        provider::ProviderState,
        service::RagSettings,
    },
    err,
    error::MedragError,
    map_err,
};
use dto::{ChatPayload, SearchPayload};
use std::{sync::Arc, time::Instant};
use tracing::{debug, info};
use validify::Validify;

/// Retrieval augmented question answering.
#[derive(Clone)]
pub struct ChatService {
    providers: ProviderState,
    settings: Arc<RagSettings>,
    prompt: Arc<PromptTemplate>,
}

impl ChatService {
    pub fn new(
        providers: ProviderState,
        settings: Arc<RagSettings>,
        prompt: Arc<PromptTemplate>,
    ) -> Self {
        Self {
            providers,
            settings,
            prompt,
        }
    }

    /// Retrieve the chunks most similar to the query, most similar first.
    pub async fn search(&self, mut search: SearchPayload) -> Result<Vec<ScoredChunk>, MedragError> {
        map_err!(search.validify());

        let limit = search.limit.unwrap_or(self.settings.top_k);
        self.retrieve(&search.query, limit).await
    }

    /// Answer a question using the chunks most similar to it as context.
    ///
    /// An answer is generated even if nothing was retrieved, in which case the
    /// model is expected to say it does not know.
    pub async fn answer(&self, mut payload: ChatPayload) -> Result<ChatResponse, MedragError> {
        map_err!(payload.validify());

        let start = Instant::now();

        let limit = payload.top_k.unwrap_or(self.settings.top_k);
        let sources = self.retrieve(&payload.question, limit).await?;

        debug!("Retrieved {} chunks for question", sources.len());

        let llm = self.providers.llm.get_provider(&self.settings.llm_provider)?;
        let messages = self.prompt.messages(&sources, &payload.question);
        let answer = llm.generate(&messages, &self.settings.generation).await?;

        info!(
            "Answered question using {} chunks, took {}ms",
            sources.len(),
            start.elapsed().as_millis()
        );

        Ok(ChatResponse {
            answer,
            model: llm.model().to_string(),
            sources,
        })
    }

    async fn retrieve(&self, query: &str, limit: u32) -> Result<Vec<ScoredChunk>, MedragError> {
        let RagSettings {
            collection,
            vector_provider,
            embedding_provider,
            embedding_model,
            ..
        } = &*self.settings;

        let vector_db = self.providers.vector.get_provider(vector_provider)?;
        let embedder = self.providers.embedding.get_provider(embedding_provider)?;

        let collection = vector_db.get_collection(collection).await?;

        let mut embeddings = embedder.embed(&[query], embedding_model).await?;

        let Some(query_vector) = embeddings.pop() else {
            return err!(
                InvalidEmbeddingModel,
                "Embedder '{}' returned no vectors for query",
                embedder.id()
            );
        };

        if query_vector.len() != collection.size {
            return err!(
                InvalidEmbeddingModel,
                "Query vector of size {} does not match collection '{}' of size {}",
                query_vector.len(),
                collection.name,
                collection.size
            );
        }

        vector_db.query(query_vector, &collection.name, limit).await
    }
}

/// Chat DTOs.
pub mod dto {
    use crate::core::service::{MAX_QUESTION_LENGTH, MAX_TOP_K};
    use serde::Deserialize;
    use validify::{schema_err, schema_validation, ValidationErrors, Validify};

    /// Params for semantic search.
    #[derive(Debug, Deserialize, Validify, utoipa::ToSchema)]
    #[serde(rename_all = "camelCase")]
    #[validate(Self::validate_schema)]
    pub struct SearchPayload {
        /// The text to search by.
        #[modify(trim)]
        #[validate(length(min = 1))]
        pub query: String,

        /// Amount of results to return.
        pub limit: Option<u32>,
    }

    impl SearchPayload {
        pub fn new(query: impl Into<String>, limit: Option<u32>) -> Self {
            Self {
                query: query.into(),
                limit,
            }
        }

        #[schema_validation]
        fn validate_schema(&self) -> Result<(), ValidationErrors> {
            if self.limit.is_some_and(|l| l == 0 || l > MAX_TOP_K) {
                schema_err!("limit", "limit must be between 1 and 20");
            }
        }
    }

    /// A question for the chatbot.
    #[derive(Debug, Deserialize, Validify, utoipa::ToSchema)]
    #[serde(rename_all = "camelCase")]
    #[validate(Self::validate_schema)]
    pub struct ChatPayload {
        #[modify(trim)]
        #[validate(length(min = 1))]
        pub question: String,

        /// Amount of chunks to use as context.
        pub top_k: Option<u32>,
    }

    impl ChatPayload {
        pub fn new(question: impl Into<String>) -> Self {
            Self {
                question: question.into(),
                top_k: None,
            }
        }

        #[schema_validation]
        fn validate_schema(&self) -> Result<(), ValidationErrors> {
            if self.top_k.is_some_and(|k| k == 0 || k > MAX_TOP_K) {
                schema_err!("topK", "topK must be between 1 and 20");
            }
            if self.question.chars().count() as u64 > MAX_QUESTION_LENGTH {
                schema_err!("question", "question must be at most 4000 characters");
            }
        }
    }
}
