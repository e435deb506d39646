use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::entities::query::ChatReply;
use crate::llm::{ChatMessage, LlmClient, LlmError};

/// Input that ends an interactive session
pub const EXIT_COMMAND: &str = "exit";

/// True when `line` asks to end the session
pub fn is_exit(line: &str) -> bool {
    line.trim() == EXIT_COMMAND
}

/// Trait for free-form prompts sent straight to the model
#[async_trait]
pub trait ChatServiceTrait: Send + Sync {
    /// Send one prompt and return the model's reply
    async fn send(&self, prompt: &str) -> Result<ChatReply, LlmError>;
}

/// One-shot prompt session; each prompt is sent without earlier turns
pub struct ChatSession<L: LlmClient> {
    llm: Arc<L>,
}

impl<L: LlmClient> ChatSession<L> {
    pub fn new(llm: Arc<L>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl<L: LlmClient + 'static> ChatServiceTrait for ChatSession<L> {
    #[instrument(skip(self, prompt))]
    async fn send(&self, prompt: &str) -> Result<ChatReply, LlmError> {
        debug!("Sending prompt of {} characters", prompt.len());
        let reply = self.llm.complete(&[ChatMessage::user(prompt)]).await?;

        Ok(ChatReply {
            reply,
            model: self.llm.model(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::testing::ScriptedLlmClient;

    #[test]
    fn test_is_exit() {
        assert!(is_exit("exit"));
        assert!(is_exit("  exit\n"));
        assert!(!is_exit("EXIT"));
        assert!(!is_exit("exit now"));
    }

    #[tokio::test]
    async fn test_send_is_one_shot() {
        let llm = Arc::new(ScriptedLlmClient::new(["Hello!", "Paris."]));
        let session = ChatSession::new(llm.clone());

        let first = session.send("Hi").await.unwrap();
        assert_eq!(
            first,
            ChatReply {
                reply: "Hello!".to_string(),
                model: "scripted-model".to_string()
            }
        );

        session.send("Capital of France?").await.unwrap();
        let requests = llm.requests();
        assert_eq!(requests[1], vec![ChatMessage::user("Capital of France?")]);
    }

    #[test]
    fn test_send_propagates_llm_errors() {
        let mut mock = MockLlmClient::new();
        mock.expect_complete()
            .withf(|messages| messages.len() == 1)
            .returning(|_| Err(LlmError::EmptyResponse));

        let session = ChatSession::new(Arc::new(mock));
        let result = tokio_test::block_on(session.send("hello"));
        assert!(matches!(result, Err(LlmError::EmptyResponse)));
    }
}
