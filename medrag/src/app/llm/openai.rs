use crate::{
    core::llm::{GenerationParams, Llm, Message},
    error::{MedragErr, MedragError},
    map_err, upstream_err,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for any endpoint implementing the OpenAI `/v1/chat/completions` API,
/// e.g. Groq.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    endpoint: String,
    key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// * `endpoint`: Base URL, without the `/v1/chat/completions` suffix.
    /// * `key`: Bearer token.
    /// * `model`: Model generating completions.
    pub fn new(endpoint: &str, key: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("unable to build http client");

        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            key: key.to_string(),
            model: model.to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Llm for OpenAiChat {
    fn id(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<String, MedragError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        debug!(
            "Requesting completion from {} ({} messages)",
            self.model,
            messages.len()
        );

        let response = map_err!(
            self.client
                .post(format!("{}/v1/chat/completions", self.endpoint))
                .bearer_auth(&self.key)
                .json(&request)
                .send()
                .await
        );

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("LLM responded with {status}: {body}");
            return upstream_err!("llm", status.as_u16(), body);
        }

        let response: CompletionResponse = map_err!(response.json().await);

        let Some(content) = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
        else {
            return Err(MedragError::new(
                file!(),
                line!(),
                column!(),
                MedragErr::UpstreamResponse {
                    service: "llm",
                    message: "completion contains no message content".to_string(),
                },
            ));
        };

        if let Some(usage) = response.usage {
            debug!(
                "Completion used {} prompt and {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        Ok(content)
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
