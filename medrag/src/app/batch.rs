use super::state::ServiceState;
use crate::{
    core::{model::DocumentSource, service::ingest::IngestOutcome},
    error::MedragError,
};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type IngestExecutorHandle = mpsc::Sender<IngestJob>;

/// Runs ingestion jobs in the background, one at a time.
pub struct IngestExecutor {
    /// Job receiver.
    job_rx: mpsc::Receiver<IngestJob>,

    state: ServiceState,
}

impl IngestExecutor {
    pub fn new(job_rx: mpsc::Receiver<IngestJob>, state: ServiceState) -> Self {
        Self { job_rx, state }
    }

    pub fn start(mut self) {
        tokio::spawn(async move {
            while let Some(job) = self.job_rx.recv().await {
                let job_id = Uuid::new_v4();

                tracing::info!(
                    "Starting job '{job_id}' | Sources: {} | Force: {}",
                    job.sources
                        .as_ref()
                        .map(|s| s.len().to_string())
                        .unwrap_or_else(|| "all".to_string()),
                    job.force
                );

                Self::execute_job(job_id, &self.state, job).await;

                tracing::info!("Job '{job_id}' finished");
            }

            tracing::info!("Job receiver channel closed, shutting down executor");
        });
    }

    async fn execute_job(job_id: Uuid, state: &ServiceState, job: IngestJob) {
        let IngestJob {
            force,
            sources,
            finished_tx,
        } = job;

        /// Matches the result and continues on error, sending the error to the result channel.
        macro_rules! ok_or_continue {
            ($e:expr) => {
                match $e {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!("Sending error to channel ({e:?})");
                        let _ = finished_tx.send(JobResult::Err(e)).await;
                        continue;
                    }
                }
            };
        }

        /// Matches the result and returns on error, sending the error to the result channel.
        macro_rules! ok_or_return {
            ($e:expr) => {
                match $e {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::debug!("Sending error to channel ({e:?})");
                        let _ = finished_tx.send(JobResult::Err(e)).await;
                        return;
                    }
                }
            };
        }

        let ingest = &state.ingest;

        let documents: Vec<DocumentSource> = match sources {
            Some(names) => {
                let mut documents = vec![];
                for name in names {
                    documents.push(ok_or_continue!(ingest.get_source(&name).await));
                }
                documents
            }
            None => ok_or_return!(ingest.list_sources().await),
        };

        for source in documents {
            tracing::debug!("Job '{job_id}' | Processing '{}'", source.name);

            // Initialize the report so we get the timestamp before the ingestion starts
            let report = IngestReportBuilder::new(&source.name);

            let IngestOutcome {
                hash,
                total_chunks,
                skipped,
            } = ok_or_continue!(ingest.ingest_document(&source, force).await);

            let settings = ingest.settings();

            let report = report
                .hash(hash)
                .collection(settings.collection.clone())
                .model_used(settings.embedding_model.clone())
                .vector_db(settings.vector_provider.clone())
                .total_chunks(total_chunks)
                .skipped(skipped)
                .finished_at(Utc::now())
                .build();

            if finished_tx.send(JobResult::Ok(report)).await.is_err() {
                tracing::warn!("Job '{job_id}' | Receiver dropped, reports are discarded");
            }
        }
    }
}

/// Used for ingestion jobs.
#[derive(Debug)]
pub struct IngestJob {
    /// Re-index documents whose content did not change.
    force: bool,

    /// Names of documents to ingest. All documents in the store if `None`.
    sources: Option<Vec<String>>,

    /// Sends reports back to whatever sent the job.
    finished_tx: mpsc::Sender<JobResult>,
}

impl IngestJob {
    pub fn new(
        force: bool,
        sources: Option<Vec<String>>,
        finished_tx: mpsc::Sender<JobResult>,
    ) -> Self {
        Self {
            force,
            sources,
            finished_tx,
        }
    }
}

/// Result of ingesting a single document.
#[derive(Debug)]
pub enum JobResult {
    Ok(IngestReport),
    Err(MedragError),
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub source: String,
    pub hash: String,
    pub collection: String,
    pub model_used: String,
    pub vector_db: String,
    pub total_chunks: usize,

    /// Whether the document was already indexed with the same content.
    pub skipped: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug)]
struct IngestReportBuilder {
    source: String,
    hash: String,
    collection: String,
    model_used: String,
    vector_db: String,
    total_chunks: usize,
    skipped: bool,
    started_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl IngestReportBuilder {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            started_at: chrono::Utc::now(),
            hash: String::new(),
            collection: String::new(),
            model_used: String::new(),
            vector_db: String::new(),
            total_chunks: 0,
            skipped: false,
            finished_at: None,
        }
    }

    fn hash(mut self, hash: String) -> Self {
        self.hash = hash;
        self
    }

    fn collection(mut self, collection: String) -> Self {
        self.collection = collection;
        self
    }

    fn model_used(mut self, model_used: String) -> Self {
        self.model_used = model_used;
        self
    }

    fn vector_db(mut self, vector_db: String) -> Self {
        self.vector_db = vector_db;
        self
    }

    fn total_chunks(mut self, total_chunks: usize) -> Self {
        self.total_chunks = total_chunks;
        self
    }

    fn skipped(mut self, skipped: bool) -> Self {
        self.skipped = skipped;
        self
    }

    fn finished_at(mut self, finished_at: chrono::DateTime<chrono::Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self
    }

    fn build(self) -> IngestReport {
        IngestReport {
            source: self.source,
            hash: self.hash,
            collection: self.collection,
            model_used: self.model_used,
            vector_db: self.vector_db,
            total_chunks: self.total_chunks,
            skipped: self.skipped,
            started_at: self.started_at,
            finished_at: self.finished_at.unwrap_or_else(Utc::now),
        }
    }
}
