use crate::{
    core::{
        document::{parser::Parser, sha256},
        model::{Chunk, DocumentSource, IndexEntry, VectorCollection},
        provider::ProviderState,
        service::RagSettings,
    },
    err,
    error::{MedragErr, MedragError},
    map_err,
};
use dto::ChunkPreviewPayload;
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, warn};
use validify::Validate;

/// Document indexing.
#[derive(Clone)]
pub struct IngestService {
    providers: ProviderState,
    settings: Arc<RagSettings>,
}

impl IngestService {
    pub fn new(providers: ProviderState, settings: Arc<RagSettings>) -> Self {
        Self {
            providers,
            settings,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    /// Create the configured collection with the embedding model's dimension if it does not
    /// exist. Errors if it exists with a different dimension.
    pub async fn ensure_collection(&self) -> Result<VectorCollection, MedragError> {
        let RagSettings {
            collection,
            vector_provider,
            embedding_provider,
            embedding_model,
            ..
        } = &*self.settings;

        let vector_db = self.providers.vector.get_provider(vector_provider)?;
        let embedder = self.providers.embedding.get_provider(embedding_provider)?;

        let Some(size) = embedder.size(embedding_model).await? else {
            let embedder_id = embedder.id();
            return err!(
                InvalidEmbeddingModel,
                "Model {embedding_model} not supported by embedder '{embedder_id}'"
            );
        };

        match vector_db.get_collection(collection).await {
            Ok(existing) if existing.size == size => Ok(existing),
            Ok(existing) => err!(
                InvalidEmbeddingModel,
                "Collection '{collection}' has dimension {}, model '{embedding_model}' produces {size}",
                existing.size
            ),
            Err(MedragError {
                error: MedragErr::DoesNotExist(_),
                ..
            }) => {
                info!(
                    "Creating collection '{collection}' of size {size} in {}",
                    vector_db.id()
                );
                vector_db.create_default_collection(collection, size).await?;
                Ok(VectorCollection::new(collection.as_str(), size))
            }
            Err(e) => Err(e),
        }
    }

    /// List the documents available for ingestion.
    pub async fn list_sources(&self) -> Result<Vec<DocumentSource>, MedragError> {
        let store = self
            .providers
            .document
            .get_provider(&self.settings.document_provider)?;
        store.list().await
    }

    /// Get a document available for ingestion.
    ///
    /// * `name`: Document name.
    pub async fn get_source(&self, name: &str) -> Result<DocumentSource, MedragError> {
        let store = self
            .providers
            .document
            .get_provider(&self.settings.document_provider)?;
        store.get(name).await
    }

    /// Parse, chunk, embed and index a document, replacing its previous entries.
    ///
    /// Documents already fully indexed with the same content hash are skipped unless `force`
    /// is set. Partially indexed documents are re-indexed.
    ///
    /// * `source`: The document to ingest.
    /// * `force`: Whether to re-index unchanged documents.
    pub async fn ingest_document(
        &self,
        source: &DocumentSource,
        force: bool,
    ) -> Result<IngestOutcome, MedragError> {
        let start = Instant::now();

        let RagSettings {
            collection,
            vector_provider,
            embedding_provider,
            embedding_model,
            document_provider,
            embed_batch_size,
            chunker,
            ..
        } = &*self.settings;

        let store = self.providers.document.get_provider(document_provider)?;
        let vector_db = self.providers.vector.get_provider(vector_provider)?;
        let embedder = self.providers.embedding.get_provider(embedding_provider)?;

        let VectorCollection { size, .. } = self.ensure_collection().await?;

        let content = store.read(source).await?;
        let hash = sha256(&content);

        let ty = source.ty;
        let pages = map_err!(
            tokio::task::spawn_blocking(move || Parser::new(ty).parse(&content)).await
        )?;
        let chunks = chunker.chunk_pages(&source.name, &pages)?;

        if !force {
            let indexed = vector_db
                .count_vectors(collection, &source.name, Some(&hash))
                .await?;

            // Entries of an interrupted ingestion carry the current hash but are incomplete
            let complete = indexed == chunks.len()
                && vector_db.count_vectors(collection, &source.name, None).await? == indexed;

            if complete {
                info!(
                    "'{}' already indexed with {indexed} vectors ({hash}), skipping",
                    source.name
                );
                return Ok(IngestOutcome {
                    hash,
                    total_chunks: indexed,
                    skipped: true,
                });
            }

            if indexed > 0 {
                warn!(
                    "'{}' has {indexed} of {} vectors indexed, re-indexing",
                    source.name,
                    chunks.len()
                );
            }
        }

        if chunks.is_empty() {
            warn!("'{}' produced no chunks", source.name);
        }

        vector_db.delete_embeddings(collection, &source.name).await?;

        let total_chunks = chunks.len();
        let batch_size = (*embed_batch_size).max(1);

        for batch in chunks.chunks(batch_size) {
            let content = batch.iter().map(|c| c.content.as_str()).collect::<Vec<_>>();
            let vectors = embedder.embed(&content, embedding_model).await?;

            if vectors.len() != batch.len() {
                return err!(
                    InvalidEmbeddingModel,
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }

            if let Some(v) = vectors.iter().find(|v| v.len() != size) {
                return err!(
                    InvalidEmbeddingModel,
                    "Embedding of size {} does not match collection size {size}",
                    v.len()
                );
            }

            let entries = batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry {
                    chunk,
                    vector,
                    hash: hash.clone(),
                })
                .collect();

            vector_db.insert_embeddings(collection, entries).await?;

            debug!("Indexed {} chunks of '{}'", batch.len(), source.name);
        }

        info!(
            "Indexed '{}' ({total_chunks} chunks), took {}ms",
            source.name,
            start.elapsed().as_millis()
        );

        Ok(IngestOutcome {
            hash,
            total_chunks,
            skipped: false,
        })
    }

    /// Chunk a stored document without indexing it.
    ///
    /// * `payload`: Document and optional parsing and chunking configuration.
    pub async fn chunk_preview(&self, payload: ChunkPreviewPayload) -> Result<Vec<Chunk>, MedragError> {
        map_err!(payload.validate());

        if let Some(ref parser) = payload.parser {
            map_err!(parser.validate());
        }

        let ChunkPreviewPayload {
            name,
            parser,
            chunker,
        } = payload;

        let store = self
            .providers
            .document
            .get_provider(&self.settings.document_provider)?;

        let source = store.get(&name).await?;
        let content = store.read(&source).await?;

        let ty = source.ty;
        let parser = Parser::new_from(ty, parser.unwrap_or_default());
        let pages =
            map_err!(tokio::task::spawn_blocking(move || parser.parse(&content)).await)?;
        let chunker = chunker.unwrap_or_else(|| self.settings.chunker.clone());

        chunker.chunk_pages(&source.name, &pages)
    }

    /// Remove all index entries of a document. The document itself is left in the store.
    ///
    /// * `name`: Document name.
    pub async fn remove_document(&self, name: &str) -> Result<(), MedragError> {
        let vector_db = self
            .providers
            .vector
            .get_provider(&self.settings.vector_provider)?;

        let count = vector_db
            .count_vectors(&self.settings.collection, name, None)
            .await?;

        if count == 0 {
            return err!(DoesNotExist, "Index entries for '{name}'");
        }

        vector_db
            .delete_embeddings(&self.settings.collection, name)
            .await?;

        info!("Removed {count} vectors of '{name}'");

        Ok(())
    }
}

/// Result of ingesting a single document.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    /// Content hash of the ingested document.
    pub hash: String,

    /// Amount of indexed chunks. For skipped documents the amount already in the index.
    pub total_chunks: usize,

    /// Whether the document was already indexed.
    pub skipped: bool,
}

pub mod dto {
    use crate::core::{chunk::ChunkConfig, document::parser::ParseConfig};
    use serde::Deserialize;
    use validify::Validate;

    /// DTO used for previewing chunks.
    #[derive(Debug, Deserialize, Validate, utoipa::ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct ChunkPreviewPayload {
        /// Document name.
        #[validate(length(min = 1))]
        pub name: String,

        /// Parsing configuration.
        pub parser: Option<ParseConfig>,

        /// Chunking configuration. Uses the configured chunker if omitted.
        pub chunker: Option<ChunkConfig>,
    }
}
