//! Hugging Face inference client.
//!
//! Uses the OpenAI-compatible chat-completions route exposed for every
//! model: `{base_url}/{model}/v1/chat/completions`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use super::{ChatMessage, LlmClient, LlmConfig, LlmError};

/// Chat-completions request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    content: Option<String>,
}

/// LLM client for the Hugging Face inference API
pub struct HuggingFaceClient {
    config: LlmConfig,
    client: Client,
}

impl HuggingFaceClient {
    /// Create a new client; the HTTP timeout comes from the configuration
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { config, client })
    }

    /// Full chat-completions URL for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl LlmClient for HuggingFaceClient {
    #[instrument(skip(self, messages), fields(model = %self.config.model, messages = messages.len()))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            LlmError::MissingApiKey("set HF_API_KEY or provide hf_api_key.txt".to_string())
        })?;

        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Inference API returned {}", status);
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        debug!("LLM replied with {} characters", content.len());
        Ok(content)
    }

    fn model(&self) -> String {
        self.config.model.clone()
    }
}
