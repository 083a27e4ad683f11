use super::{document::store::DocumentStore, embedder::Embedder, llm::Llm, vector::VectorDb};
use crate::error::MedragError;
use std::sync::Arc;

type DynVectorDb = Arc<dyn VectorDb + Send + Sync>;
type DynEmbedder = Arc<dyn Embedder + Send + Sync>;
type DynLlm = Arc<dyn Llm + Send + Sync>;
type DynDocumentStore = Arc<dyn DocumentStore + Send + Sync>;

/// Provider factories are used to decouple concrete implementations from the business logic.
pub trait ProviderFactory<T> {
    /// Obtain the provider registered under `id`.
    fn get_provider(&self, id: &str) -> Result<T, MedragError>;

    /// A list of available providers for a given functionality.
    fn list_provider_ids(&self) -> Vec<&'static str>;

    /// Register a new provider in this factory, replacing any provider with the same id.
    fn register(&mut self, id: &'static str, provider: T);
}

/// Holds the factories for all available providers.
#[derive(Clone)]
pub struct ProviderState {
    /// Vector database provider.
    pub vector: Arc<dyn ProviderFactory<DynVectorDb> + Send + Sync>,

    /// Embedding provider.
    pub embedding: Arc<dyn ProviderFactory<DynEmbedder> + Send + Sync>,

    /// Text generation provider.
    pub llm: Arc<dyn ProviderFactory<DynLlm> + Send + Sync>,

    /// Document storage provider.
    pub document: Arc<dyn ProviderFactory<DynDocumentStore> + Send + Sync>,
}
