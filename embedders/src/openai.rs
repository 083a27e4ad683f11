use crate::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";

const TEXT_EMBEDDING_3_LARGE: &str = "text-embedding-3-large";
const TEXT_EMBEDDING_3_SMALL: &str = "text-embedding-3-small";
const TEXT_EMBEDDING_ADA_002: &str = "text-embedding-ada-002";

/// Client for any endpoint implementing the OpenAI `/v1/embeddings` API.
pub struct OpenAiEmbeddings {
    endpoint: String,
    key: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(api_key: &str) -> Self {
        Self::with_endpoint(DEFAULT_OPENAI_ENDPOINT, api_key)
    }

    /// Use a custom base URL, without the `/v1/embeddings` suffix.
    pub fn with_endpoint(endpoint: &str, api_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn list_embedding_models(&self) -> Vec<(String, usize)> {
        vec![
            (String::from(TEXT_EMBEDDING_3_LARGE), 3072),
            (String::from(TEXT_EMBEDDING_3_SMALL), 1536),
            (String::from(TEXT_EMBEDDING_ADA_002), 1536),
        ]
    }

    pub fn size(&self, model: &str) -> Option<usize> {
        self.list_embedding_models()
            .into_iter()
            .find(|(name, _)| name == model)
            .map(|(_, size)| size)
    }

    pub async fn embed(
        &self,
        input: &[&str],
        model: &str,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if input.is_empty() {
            return Err(EmbeddingError::InvalidInput(format!(
                "cannot be empty (len = {})",
                input.len()
            )));
        }

        let request = EmbeddingRequest {
            model: model.to_string(),
            input: input.iter().map(|s| s.to_string()).collect(),
        };

        let response = match self
            .client
            .post(format!("{}/v1/embeddings", self.endpoint))
            .bearer_auth(&self.key)
            .json(&request)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                tracing::error!("Error in OpenAI request: {e}");
                return Err(EmbeddingError::Reqwest(e));
            }
        };

        if response.status() != 200 {
            tracing::error!(
                "Request to {} failed with status {}",
                response.url(),
                response.status()
            );
            let status = response.status().as_u16();
            let mut response = match response.json::<OpenAIError>().await {
                Ok(res) => res,
                Err(e) => {
                    tracing::error!("Error reading OpenAI response: {}", e);
                    tracing::error!("Source: {:?}", e.source());
                    return Err(EmbeddingError::Reqwest(e));
                }
            };
            response.status = status;
            tracing::error!("Response: {response:?}");
            return Err(EmbeddingError::OpenAI(response));
        }

        let response = match response.json::<EmbeddingResponse>().await {
            Ok(res) => res,
            Err(e) => {
                tracing::error!("Error decoding OpenAI response: {}", e);
                tracing::error!("Source: {:?}", e.source());
                return Err(EmbeddingError::Reqwest(e));
            }
        };

        debug!(
            "Embedded {} chunk(s) with '{}', used tokens {}-{} (prompt-total)",
            input.len(),
            response.model,
            response.usage.prompt_tokens,
            response.usage.total_tokens
        );

        let mut data = response.data;
        data.sort_by_key(|o| o.index);

        Ok(data.into_iter().map(|o| o.embedding).collect())
    }
}

impl std::fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingObject>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: usize,
    total_tokens: usize,
}

#[derive(Debug, Deserialize, Error)]
#[error("{message}, type: {r#type}, param: {param:?}, code: {code:?}")]
pub struct OpenAIErrorParams {
    pub message: String,
    pub r#type: String,
    pub param: Option<String>,
    pub code: Option<ErrorCode>,
}

#[derive(Debug, Deserialize, Error)]
#[error("Open AI error response (status {status}) {{ {error} }}")]
pub struct OpenAIError {
    /// HTTP status of the response, filled in after decoding.
    #[serde(skip)]
    pub status: u16,
    pub error: OpenAIErrorParams,
}

/// Error codes come back as either strings or numbers depending on the provider.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Str(String),
    Num(i64),
}

#[cfg(test)]
mod tests {
    use super::OpenAiEmbeddings;

    #[test]
    fn known_model_sizes() {
        let embedder = OpenAiEmbeddings::new("key");
        assert_eq!(Some(1536), embedder.size("text-embedding-3-small"));
        assert_eq!(Some(3072), embedder.size("text-embedding-3-large"));
        assert_eq!(None, embedder.size("foo"));
    }

    #[test]
    fn endpoint_is_normalized() {
        let embedder = OpenAiEmbeddings::with_endpoint("http://localhost:8000/", "key");
        assert_eq!("http://localhost:8000", embedder.endpoint());
    }
}
