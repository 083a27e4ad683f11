#[rustfmt::skip]
use super::router::{
    // App config
    __path_health_check,
    __path_app_config,
    // Chat
    chat::{
        __path_get_answer,
        __path_chat,
        __path_search,
        __path_list_documents,
        __path_remove_document,
        __path_chunk_preview,
    },
    // Ingestion
    ingest::{
        __path_ingest,
        IngestPayload,
    },
    Health,
};
use crate::{
    app::{batch::IngestReport, state::AppConfig},
    core::{
        chunk::{ChunkConfig, RecursiveConfig, SlidingWindowConfig},
        document::parser::ParseConfig,
        llm::GenerationParams,
        model::{ChatResponse, Chunk, DocumentSource, DocumentType, ScoredChunk},
        service::{
            chat::dto::{ChatPayload, SearchPayload},
            ingest::dto::ChunkPreviewPayload,
            RagSettings,
        },
    },
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // App config
        health_check,
        app_config,
        // Chat
        get_answer,
        chat,
        search,
        // Documents
        list_documents,
        remove_document,
        chunk_preview,
        ingest,
    ),
    components(schemas(
        Health,
        AppConfig,
        RagSettings,
        GenerationParams,
        ChunkConfig,
        RecursiveConfig,
        SlidingWindowConfig,
        ParseConfig,
        ChatPayload,
        ChatResponse,
        SearchPayload,
        ScoredChunk,
        Chunk,
        DocumentSource,
        DocumentType,
        ChunkPreviewPayload,
        IngestPayload,
        IngestReport,
    )),
    tags(
        (name = "medrag", description = "Medical question answering over indexed documents")
    )
)]
pub struct ApiDoc;
