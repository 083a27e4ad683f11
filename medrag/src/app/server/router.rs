use super::api::ApiDoc;
use crate::{
    app::state::{AppConfig, AppState},
    error::MedragError,
};
use axum::{
    extract::State,
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::time::Duration;
use tower_http::{classify::ServerErrorsFailureClass, cors::CorsLayer, trace::TraceLayer};
use tracing::Span;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub(super) mod chat;
pub(super) mod ingest;

pub fn router(state: AppState, origins: Vec<String>) -> Router {
    let origins = origins.into_iter().filter_map(|origin| {
        match HeaderValue::from_str(&origin) {
            Ok(value) => {
                tracing::info!("Adding {origin} to allowed origins");
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Invalid origin '{origin}': {e}");
                None
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::list(origins))
        .allow_headers(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE]);

    use chat::*;
    use ingest::*;

    let info = Router::new()
        .route("/info", get(app_config))
        .with_state(state.clone());

    let ingest_router = Router::new()
        .route("/ingest", post(ingest))
        .with_state(state.ingest_executor.clone());

    let router = Router::new()
        .route("/", get(index))
        .route("/get", get(get_answer).post(get_answer))
        .route("/chat", post(chat))
        .route("/search", post(search))
        .route("/documents", get(list_documents))
        .route("/documents/:name", delete(remove_document))
        .route("/chunk/preview", post(chunk_preview))
        .with_state(state.services.clone())
        .merge(ingest_router)
        .merge(info);

    router
        .layer(
            TraceLayer::new_for_http()
                .on_request(|req: &axum::http::Request<_>, _span: &Span| {
                    let ctype = req
                        .headers()
                        .get("content-type")
                        .map(|v| v.to_str().unwrap_or("none"))
                        .unwrap_or("none");

                    tracing::info!(
                        "Processing request | {} {} | content-type: {ctype}",
                        req.method(),
                        req.uri().path()
                    );
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, _span: &Span| {
                        let status = res.status();
                        let ctype = res
                            .headers()
                            .get("content-type")
                            .map(|v| v.to_str().unwrap_or("none"))
                            .unwrap_or("none");

                        tracing::info!(
                            "Sending response | {status} | {}ms | {ctype}",
                            latency.as_millis()
                        );
                    },
                )
                .on_failure(
                    |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        tracing::error!("Error in request: {error}")
                    },
                ),
        )
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Has to go last to exclude all the tracing/cors layers
        .route("/health", get(health_check))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub(super) struct Health {
    status: &'static str,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = Health),
    )
)]
pub(super) async fn health_check() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[utoipa::path(
    get,
    path = "/info",
    responses(
        (status = 200, description = "Get app configuration and available providers", body = AppConfig),
        (status = 500, description = "Internal server error")
    )
)]
pub(super) async fn app_config(state: State<AppState>) -> Result<impl IntoResponse, MedragError> {
    Ok(Json(state.get_configuration().await?))
}
