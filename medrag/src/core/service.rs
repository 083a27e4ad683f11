use super::{chunk::ChunkConfig, llm::GenerationParams};
use serde::Serialize;

pub mod chat;
pub mod ingest;

/// Retrieval and indexing settings shared by the services.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RagSettings {
    /// Vector collection used for indexing and retrieval.
    pub collection: String,

    pub vector_provider: String,

    pub embedding_provider: String,

    pub embedding_model: String,

    pub llm_provider: String,

    pub document_provider: String,

    /// Amount of chunks retrieved per question when not specified.
    pub top_k: u32,

    /// Amount of chunks sent to the embedder at once.
    pub embed_batch_size: usize,

    pub chunker: ChunkConfig,

    pub generation: GenerationParams,
}

/// Upper bound for the amount of retrieved chunks.
pub const MAX_TOP_K: u32 = 20;

/// Upper bound for the length of a question in characters.
pub const MAX_QUESTION_LENGTH: u64 = 4000;
