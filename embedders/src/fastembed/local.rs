use crate::error::EmbeddingError;
use fastembed::{EmbeddingModel, ModelInfo, TextEmbedding};
use ort::execution_providers::CPUExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
use std::collections::HashMap;

/// Models this embedder is willing to load.
const MODEL_LIST: &[EmbeddingModel] = &[
    EmbeddingModel::BGESmallENV15,
    EmbeddingModel::BGELargeENV15,
    EmbeddingModel::BGEBaseENV15,
    EmbeddingModel::AllMiniLML6V2,
    EmbeddingModel::AllMiniLML12V2,
];

/// Runs fastembed ONNX models in process.
///
/// Loading a model downloads it on first use, so only the models passed to
/// [LocalFastEmbedder::new_with_models] are ever loaded.
pub struct LocalFastEmbedder {
    models: HashMap<String, TextEmbedding>,
}

impl LocalFastEmbedder {
    /// Initialise the embedder with a single model, e.g. `Qdrant/all-MiniLM-L6-v2-onnx`.
    pub fn new_with_model(model: &str) -> Result<Self, EmbeddingError> {
        Self::new_with_models(&[model])
    }

    /// Initialise the embedder with the given model codes.
    /// Errors if a model is unknown or fails to load.
    pub fn new_with_models(codes: &[&str]) -> Result<Self, EmbeddingError> {
        tracing::info!("Initializing local Fastembed");

        #[cfg(feature = "cuda")]
        {
            use ort::execution_providers::ExecutionProvider;
            tracing::info!(
                "Using CUDA: {:?}",
                ExecutionProvider::is_available(&CUDAExecutionProvider::default())
            );
        }

        let available = list_models();
        let mut models = HashMap::new();

        for code in codes {
            let Some(info) = available.iter().find(|m| m.model_code == *code) else {
                return Err(EmbeddingError::InvalidModel(format!(
                    "model '{code}' not supported by fastembed"
                )));
            };

            tracing::info!("Setting up text embedding model: {}", info.model_code);

            let embedding = TextEmbedding::try_new(
                fastembed::InitOptions::new(info.model.clone())
                    .with_execution_providers(vec![
                        #[cfg(feature = "cuda")]
                        CUDAExecutionProvider::default().into(),
                        CPUExecutionProvider::default().into(),
                    ])
                    .with_show_download_progress(true),
            )
            .map_err(|e| EmbeddingError::Fastembed(e.to_string()))?;

            models.insert(info.model_code.clone(), embedding);
        }

        Ok(Self { models })
    }

    /// All models supported by this embedder, loaded or not.
    pub fn list_models(&self) -> Vec<ModelInfo<EmbeddingModel>> {
        list_models()
    }

    /// Output dimension of `model`, if supported.
    pub fn size(&self, model: &str) -> Option<usize> {
        list_models()
            .into_iter()
            .find(|m| m.model_code == model)
            .map(|m| m.dim)
    }

    /// Embed `content` with a loaded model. This is CPU bound and blocks the calling thread.
    pub fn embed(&self, content: &[&str], model: &str) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if content.is_empty() {
            return Ok(vec![]);
        }

        let embedder = self.models.get(model).ok_or_else(|| {
            EmbeddingError::InvalidModel(format!("model '{model}' is not loaded"))
        })?;

        let embeddings = embedder
            .embed(content.to_vec(), None)
            .map_err(|e| EmbeddingError::Fastembed(e.to_string()))?;

        debug_assert_eq!(
            embeddings.len(),
            content.len(),
            "Content length is different from embeddings!"
        );

        Ok(embeddings)
    }
}

fn list_models() -> Vec<ModelInfo<EmbeddingModel>> {
    TextEmbedding::list_supported_models()
        .into_iter()
        .filter(|model| MODEL_LIST.contains(&model.model))
        .collect()
}

impl std::fmt::Debug for LocalFastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFastEmbedder")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .finish()
    }
}
