use crate::error::MedragError;

/// Operations related to embeddings and their models.
#[async_trait::async_trait]
pub trait Embedder {
    fn id(&self) -> &'static str;

    /// Returns the default model and its vector size.
    fn default_model(&self) -> (String, usize);

    /// List all available models and their vector sizes.
    async fn list_embedding_models(&self) -> Result<Vec<(String, usize)>, MedragError>;

    /// Get the vectors for the elements in `content`.
    /// The content passed in can be a user's query,
    /// or a chunked document.
    ///
    /// * `content`: The text to embed.
    /// * `model`: The embedding model to use.
    async fn embed(&self, content: &[&str], model: &str) -> Result<Vec<Vec<f32>>, MedragError>;

    /// Get the vector size of the given model, if the embedder supports it.
    async fn size(&self, model: &str) -> Result<Option<usize>, MedragError> {
        let size = self
            .list_embedding_models()
            .await?
            .into_iter()
            .find(|m| m.0 == model)
            .map(|m| m.1);
        Ok(size)
    }
}
