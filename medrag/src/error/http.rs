use super::{MedragErr, MedragError};
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

impl MedragError {
    pub fn status(&self) -> StatusCode {
        use MedragErr as E;
        use StatusCode as SC;
        match self.error {
            E::DoesNotExist(_) => SC::NOT_FOUND,
            E::AlreadyExists(_) => SC::CONFLICT,
            E::Validation(_)
            | E::Regex(_)
            | E::Chunker(_)
            | E::InvalidFileName(_)
            | E::UnsupportedFileType(_)
            | E::InvalidProvider(_)
            | E::InvalidPrompt(_)
            | E::InvalidEmbeddingModel(_)
            | E::ParseConfig(_) => SC::UNPROCESSABLE_ENTITY,
            E::Upstream { status, .. } => upstream_status(status),
            E::UpstreamResponse { .. } => SC::BAD_GATEWAY,
            E::Reqwest(ref e) => reqwest_status(e),

            #[cfg(any(feature = "fe-local", feature = "openai"))]
            E::Embedding(ref e) => embedding_status(e),

            #[cfg(feature = "qdrant")]
            E::Qdrant(_) => SC::BAD_GATEWAY,

            E::ParsePdf(_)
            | E::IO(_)
            | E::Utf8(_)
            | E::Batch
            | E::Join(_)
            | E::SerdeJson(_) => SC::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> ErrorType {
        match self.status() {
            StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                ErrorType::Upstream
            }
            s if s.is_client_error() => ErrorType::Api,
            _ => ErrorType::Internal,
        }
    }
}

fn upstream_status(status: u16) -> StatusCode {
    match status {
        429 => StatusCode::TOO_MANY_REQUESTS,
        408 | 504 => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn reqwest_status(e: &reqwest::Error) -> StatusCode {
    if e.is_timeout() {
        return StatusCode::GATEWAY_TIMEOUT;
    }
    match e.status() {
        Some(status) => upstream_status(status.as_u16()),
        None => StatusCode::BAD_GATEWAY,
    }
}

#[cfg(any(feature = "fe-local", feature = "openai"))]
fn embedding_status(e: &medrag_embedders::error::EmbeddingError) -> StatusCode {
    use medrag_embedders::error::EmbeddingError as EE;
    match e {
        EE::InvalidModel(_) | EE::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        #[cfg(feature = "fe-local")]
        EE::Fastembed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        #[cfg(feature = "openai")]
        EE::Reqwest(e) => reqwest_status(e),
        #[cfg(feature = "openai")]
        EE::OpenAI(e) => upstream_status(e.status),
    }
}

/// Error response wrapper.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponseError<T: Serialize> {
    error_type: ErrorType,
    body: T,
}

impl<T> ResponseError<T>
where
    T: Serialize,
{
    pub fn new(error_type: ErrorType, body: T) -> Self {
        Self { error_type, body }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
enum ErrorType {
    Internal,
    Api,
    Upstream,
}

impl<T> IntoResponse for ResponseError<T>
where
    T: Serialize,
{
    fn into_response(self) -> axum::response::Response {
        <Json<ResponseError<T>> as IntoResponse>::into_response(Json(self))
    }
}

impl IntoResponse for MedragError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let error_type = self.error_type();

        self.print();

        use ErrorType as ET;
        use MedragErr as ME;

        match self.error {
            ME::Validation(errors) => {
                (status, ResponseError::new(ET::Api, errors)).into_response()
            }

            ME::Batch => (
                status,
                ResponseError::new(ET::Internal, "Ingestion executor unavailable".to_string()),
            )
                .into_response(),

            ME::Upstream { service, .. } | ME::UpstreamResponse { service, .. } => (
                status,
                ResponseError::new(error_type, format!("{service} unavailable")),
            )
                .into_response(),

            // Internal details stay in the logs.
            _ if error_type == ET::Internal => {
                (status, ResponseError::new(ET::Internal, "Internal".to_string())).into_response()
            }

            e => (status, ResponseError::new(error_type, e.to_string())).into_response(),
        }
    }
}
