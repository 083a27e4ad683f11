use crate::{
    core::model::{IndexEntry, ScoredChunk, VectorCollection},
    error::MedragError,
};

/// Metadata key holding the chunk text.
pub const CONTENT_PROPERTY: &str = "text";
/// Metadata key holding the name of the source document.
pub const SOURCE_PROPERTY: &str = "source";
/// Metadata key holding the page number.
pub const PAGE_PROPERTY: &str = "page";
/// Metadata key holding the chunk index within its source.
pub const CHUNK_INDEX_PROPERTY: &str = "chunk_index";
/// Metadata key holding the source content hash.
pub const HASH_PROPERTY: &str = "hash";

/// Vector database operations.
#[async_trait::async_trait]
pub trait VectorDb {
    fn id(&self) -> &'static str;

    /// Create a vector collection using cosine distance.
    ///
    /// * `name`: The name of the collection.
    /// * `size`: Vector size of the collection.
    async fn create_vector_collection(&self, name: &str, size: usize) -> Result<(), MedragError>;

    /// Get collection info. Errors with `DoesNotExist` if there is no such collection.
    ///
    /// * `name`: Collection name.
    async fn get_collection(&self, name: &str) -> Result<VectorCollection, MedragError>;

    /// Delete a vector collection.
    ///
    /// * `name`: The name of the collection.
    async fn delete_vector_collection(&self, name: &str) -> Result<(), MedragError>;

    /// Create the collection unless it already exists. Does not check the size
    /// of an existing collection.
    ///
    /// * `name`: The name of the collection.
    /// * `size`: The vector size of the collection.
    async fn create_default_collection(&self, name: &str, size: usize) -> Result<(), MedragError>;

    /// Perform semantic search. Results are ordered by descending score.
    ///
    /// * `search`: The query vector.
    /// * `collection`: The collection to search in.
    /// * `limit`: Amount of results to return.
    async fn query(
        &self,
        search: Vec<f32>,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<ScoredChunk>, MedragError>;

    /// Store the entries in the collection.
    ///
    /// * `collection`: The vector collection to store in.
    /// * `entries`: Chunks with their embeddings.
    async fn insert_embeddings(
        &self,
        collection: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<(), MedragError>;

    /// Delete all vectors of the given source document.
    ///
    /// * `collection`: The collection to delete from.
    /// * `source`: The name of the document whose vectors to delete.
    async fn delete_embeddings(&self, collection: &str, source: &str) -> Result<(), MedragError>;

    /// Returns the amount of vectors of the given source document, optionally
    /// only those indexed from content with the given hash.
    ///
    /// * `collection`: The collection to count in.
    /// * `source`: The name of the document whose vectors to count.
    /// * `hash`: Content hash.
    async fn count_vectors(
        &self,
        collection: &str,
        source: &str,
        hash: Option<&str>,
    ) -> Result<usize, MedragError>;
}
