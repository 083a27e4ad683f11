use crate::{core::model::DocumentSource, error::MedragError};

/// Read access to source documents.
/// Serves as indirection to decouple the documents from their location.
#[async_trait::async_trait]
pub trait DocumentStore {
    fn id(&self) -> &'static str;

    /// List all documents of a supported type in the store, sorted by name.
    async fn list(&self) -> Result<Vec<DocumentSource>, MedragError>;

    /// Get the document with the given name.
    ///
    /// * `name`: Document name.
    async fn get(&self, name: &str) -> Result<DocumentSource, MedragError>;

    /// Read the raw contents of a document.
    ///
    /// * `source`: The document to read.
    async fn read(&self, source: &DocumentSource) -> Result<Vec<u8>, MedragError>;
}
