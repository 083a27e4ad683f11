use crate::{core::embedder::Embedder, err, error::MedragError, map_err};
use medrag_embedders::fastembed::LocalFastEmbedder;
use std::sync::Arc;

/// Local fastembed models. Embedding runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct FastEmbedder {
    inner: Arc<LocalFastEmbedder>,

    /// Model loaded at startup and its size.
    default: (String, usize),
}

impl FastEmbedder {
    /// Load `model` and use it as the default.
    pub fn new(model: &str) -> Result<Self, MedragError> {
        let inner = map_err!(LocalFastEmbedder::new_with_model(model));

        let Some(size) = inner.size(model) else {
            return err!(InvalidEmbeddingModel, "{model}");
        };

        Ok(Self {
            inner: Arc::new(inner),
            default: (model.to_string(), size),
        })
    }
}

#[async_trait::async_trait]
impl Embedder for FastEmbedder {
    fn id(&self) -> &'static str {
        "fastembed"
    }

    fn default_model(&self) -> (String, usize) {
        self.default.clone()
    }

    async fn list_embedding_models(&self) -> Result<Vec<(String, usize)>, MedragError> {
        Ok(self
            .inner
            .list_models()
            .into_iter()
            .map(|m| (m.model_code, m.dim))
            .collect())
    }

    async fn embed(&self, content: &[&str], model: &str) -> Result<Vec<Vec<f32>>, MedragError> {
        let inner = self.inner.clone();
        let content = content.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let model = model.to_string();

        let embeddings = map_err!(
            tokio::task::spawn_blocking(move || {
                let content = content.iter().map(String::as_str).collect::<Vec<_>>();
                inner.embed(&content, &model)
            })
            .await
        );

        Ok(map_err!(embeddings))
    }

    async fn size(&self, model: &str) -> Result<Option<usize>, MedragError> {
        Ok(self.inner.size(model))
    }
}
