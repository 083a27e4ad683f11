use crate::{
    app::state::ServiceState,
    core::{
        model::{ChatResponse, Chunk, DocumentSource, ScoredChunk},
        service::{
            chat::dto::{ChatPayload, SearchPayload},
            ingest::dto::ChunkPreviewPayload,
        },
    },
    error::MedragError,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;

const CHAT_PAGE: &str = include_str!("../chat.html");

pub(super) async fn index() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

/// Question submitted by the chat page, as a form field or query parameter.
#[derive(Debug, Default, Deserialize)]
pub(super) struct MessageParams {
    msg: Option<String>,
}

#[utoipa::path(
    post,
    path = "/get",
    responses(
        (status = 200, description = "Generated answer", body = String, content_type = "text/plain"),
        (status = 400, description = "No message provided"),
        (status = 502, description = "Upstream service failure")
    ),
    params(
        ("msg" = Option<String>, Query, description = "The question. Also accepted as a form field.")
    )
)]
pub(super) async fn get_answer(
    services: State<ServiceState>,
    Query(query): Query<MessageParams>,
    form: Option<Form<MessageParams>>,
) -> Result<Response, MedragError> {
    let form = form.map(|Form(form)| form).unwrap_or_default();

    let msg = form
        .msg
        .filter(|m| !m.trim().is_empty())
        .or(query.msg.filter(|m| !m.trim().is_empty()));

    let Some(msg) = msg else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "No message provided" })),
        )
            .into_response());
    };

    let response = services.chat.answer(ChatPayload::new(msg)).await?;

    Ok(response.answer.into_response())
}

#[utoipa::path(
    post,
    path = "/chat",
    responses(
        (status = 200, description = "Generated answer and its sources", body = ChatResponse),
        (status = 422, description = "Invalid question"),
        (status = 502, description = "Upstream service failure")
    ),
    request_body = ChatPayload
)]
pub(super) async fn chat(
    services: State<ServiceState>,
    Json(payload): Json<ChatPayload>,
) -> Result<Json<ChatResponse>, MedragError> {
    Ok(Json(services.chat.answer(payload).await?))
}

#[utoipa::path(
    post,
    path = "/search",
    responses(
        (status = 200, description = "Most similar chunks", body = [ScoredChunk]),
        (status = 422, description = "Invalid query"),
        (status = 500, description = "Internal server error")
    ),
    request_body = SearchPayload
)]
pub(super) async fn search(
    services: State<ServiceState>,
    Json(search): Json<SearchPayload>,
) -> Result<Json<Vec<ScoredChunk>>, MedragError> {
    Ok(Json(services.chat.search(search).await?))
}

#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Documents available for ingestion", body = [DocumentSource]),
        (status = 500, description = "Internal server error")
    )
)]
pub(super) async fn list_documents(
    services: State<ServiceState>,
) -> Result<Json<Vec<DocumentSource>>, MedragError> {
    Ok(Json(services.ingest.list_sources().await?))
}

#[utoipa::path(
    delete,
    path = "/documents/{name}",
    responses(
        (status = 204, description = "Index entries of the document removed"),
        (status = 404, description = "Document is not indexed"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("name" = String, Path, description = "Document name")
    )
)]
pub(super) async fn remove_document(
    services: State<ServiceState>,
    Path(name): Path<String>,
) -> Result<StatusCode, MedragError> {
    services.ingest.remove_document(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/chunk/preview",
    responses(
        (status = 200, description = "Chunks of the document", body = [Chunk]),
        (status = 404, description = "Document not found"),
        (status = 422, description = "Invalid configuration")
    ),
    request_body = ChunkPreviewPayload
)]
pub(super) async fn chunk_preview(
    services: State<ServiceState>,
    Json(payload): Json<ChunkPreviewPayload>,
) -> Result<Json<Vec<Chunk>>, MedragError> {
    Ok(Json(services.ingest.chunk_preview(payload).await?))
}
