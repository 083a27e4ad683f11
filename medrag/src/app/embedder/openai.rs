use crate::core::embedder::Embedder;
use crate::error::MedragError;
use crate::map_err;

pub use medrag_embedders::openai::OpenAiEmbeddings;

#[async_trait::async_trait]
impl Embedder for OpenAiEmbeddings {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn default_model(&self) -> (String, usize) {
        (String::from("text-embedding-3-small"), 1536)
    }

    async fn list_embedding_models(&self) -> Result<Vec<(String, usize)>, MedragError> {
        Ok(self.list_embedding_models())
    }

    async fn embed(&self, content: &[&str], model: &str) -> Result<Vec<Vec<f32>>, MedragError> {
        Ok(map_err!(self.embed(content, model).await))
    }

    async fn size(&self, model: &str) -> Result<Option<usize>, MedragError> {
        Ok(self.size(model))
    }
}
