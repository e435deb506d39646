//! LLM invocation boundary.
//!
//! Everything that talks to a language model goes through [`LlmClient`], so
//! services can be exercised against scripted or mocked clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;
pub mod huggingface;

pub use config::LlmConfig;
pub use huggingface::HuggingFaceClient;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat-completions message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// LLM errors
#[derive(Debug, Error)]
pub enum LlmError {
    /// No API key was found in the environment or key file
    #[error("LLM API key is not configured: {0}")]
    MissingApiKey(String),

    /// Transport error
    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the inference API
    #[error("LLM API error {status}: {body}")]
    Status { status: u16, body: String },

    /// Body could not be decoded
    #[error("Failed to parse LLM response: {0}")]
    InvalidResponse(String),

    /// Response carried no message content
    #[error("No response from LLM")]
    EmptyResponse,
}

/// A chat-completions capable language model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send the conversation and return the assistant reply
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Model identifier used for requests
    fn model(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serialization() {
        let message = ChatMessage::user("How many patients are admitted?");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "role": "user", "content": "How many patients are admitted?" })
        );
    }

    #[test]
    fn test_chat_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::assistant("a").role, ChatRole::Assistant);
    }
}
