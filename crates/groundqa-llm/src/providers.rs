//! In-process provider doubles.
//!
//! `MockProvider` replays a script of replies and records every request it
//! receives, so pipeline tests can assert on prompts and temperatures without
//! touching the network.

use crate::llm::{CompletionRequest, CompletionResponse, FinishReason, LLMError, LLMProvider, Usage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    /// Text cut off at the output-token limit (`FinishReason::Length`).
    Truncated(String),
    /// Fails with `LLMError::Api` carrying this message.
    Error(String),
    /// Never completes; used to exercise client-side timeouts.
    Hang,
}

/// Mock provider for testing
pub struct MockProvider {
    script: Mutex<VecDeque<MockReply>>,
    /// Reply used once the script is exhausted.
    fallback: MockReply,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into()),
            fallback: MockReply::Error("mock script exhausted".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self {
            fallback: MockReply::Text(response.to_string()),
            ..Self::new(Vec::new())
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            fallback: MockReply::Error(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl LLMProvider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LLMError> {
        self.requests.lock().push(request);
        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::Text(content) => Ok(CompletionResponse {
                content,
                finish_reason: FinishReason::Stop,
                usage: Usage::default(),
                model: "mock".to_string(),
            }),
            MockReply::Truncated(content) => Ok(CompletionResponse {
                content,
                finish_reason: FinishReason::Length,
                usage: Usage::default(),
                model: "mock".to_string(),
            }),
            MockReply::Error(message) => Err(LLMError::Api(message)),
            MockReply::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockProvider::always("Test response");
        let result = provider
            .complete(CompletionRequest::prompt("Hello"))
            .await
            .unwrap();

        assert_eq!(result.content, "Test response");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let provider = MockProvider::new(vec![
            MockReply::Text("first".to_string()),
            MockReply::Error("quota exceeded".to_string()),
        ]);

        let first = provider.complete(CompletionRequest::prompt("a")).await;
        assert_eq!(first.unwrap().content, "first");

        let second = provider.complete(CompletionRequest::prompt("b")).await;
        assert!(second.unwrap_err().to_string().contains("quota exceeded"));

        let third = provider.complete(CompletionRequest::prompt("c")).await;
        assert!(third.unwrap_err().to_string().contains("exhausted"));

        let prompts: Vec<String> = provider.requests().iter().map(|r| r.user_text()).collect();
        assert_eq!(prompts, vec!["a", "b", "c"]);
    }
}
