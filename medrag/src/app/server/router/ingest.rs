use crate::{
    app::batch::{IngestExecutorHandle, IngestJob, IngestReport, JobResult},
    error::MedragError,
};
use axum::{
    extract::State,
    response::{sse::Event, Sse},
    Json,
};
use futures_util::Stream;
use serde::Deserialize;
use std::time::Duration;
use tokio_stream::StreamExt;

/// Ingestion job parameters.
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestPayload {
    /// Re-index documents whose content did not change.
    #[serde(default)]
    pub force: bool,

    /// Names of the documents to ingest. Every document in the store if omitted.
    pub sources: Option<Vec<String>>,
}

#[utoipa::path(
    post,
    path = "/ingest",
    responses(
        (status = 200, description = "Stream of ingestion reports, one event per document", body = IngestReport, content_type = "text/event-stream"),
        (status = 500, description = "Internal server error")
    ),
    request_body = IngestPayload
)]
pub(super) async fn ingest(
    State(executor): State<IngestExecutorHandle>,
    payload: Option<Json<IngestPayload>>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, MedragError> {
    let IngestPayload { force, sources } = payload.map(|Json(p)| p).unwrap_or_default();

    let (tx, rx) = tokio::sync::mpsc::channel::<JobResult>(128);

    let job = IngestJob::new(force, sources, tx);

    if let Err(e) = executor.send(job).await {
        tracing::error!("Error sending ingestion job: {:?}", e.0);
        return crate::err!(Batch);
    };

    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|result| {
        let event = match result {
            JobResult::Ok(report) => Event::default().event("report").json_data(report)?,
            JobResult::Err(err) => {
                err.print();
                let err = format!("error: {err}");
                Event::default().event("error").data(err)
            }
        };
        Ok(event)
    });

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}
