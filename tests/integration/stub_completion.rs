//! Stub completion client for integration testing.
//!
//! Provides a deterministic `CompletionClient` that returns a canned
//! reply or a canned failure and records every prompt it receives,
//! all in-memory with no network access.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use pricing_gateway::llm::{CompletionClient, Prompt};
use pricing_gateway::types::GatewayError;

/// What the stub answers with.
#[derive(Debug, Clone)]
pub enum StubReply {
    Text(String),
    Rejected { status: u16, detail: String },
    Unreachable { timed_out: bool },
    Empty,
}

pub struct StubCompletion {
    reply: StubReply,
    prompts: Arc<Mutex<Vec<Prompt>>>,
}

impl StubCompletion {
    pub fn new(reply: StubReply) -> Self {
        Self {
            reply,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(StubReply::Text(text.to_string()))
    }

    /// Number of upstream calls made so far.
    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    /// Every prompt received, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, prompt: &Prompt) -> Result<String, GatewayError> {
        self.prompts.lock().unwrap().push(prompt.clone());

        match &self.reply {
            StubReply::Text(text) => Ok(text.clone()),
            StubReply::Rejected { status, detail } => Err(GatewayError::UpstreamRejected {
                status: *status,
                detail: detail.clone(),
            }),
            StubReply::Unreachable { timed_out } => Err(GatewayError::UpstreamUnreachable {
                timed_out: *timed_out,
                message: "stub transport failure".to_string(),
            }),
            StubReply::Empty => Err(GatewayError::EmptyCompletion {
                reason: "no choices returned".to_string(),
                raw: r#"{"choices":[]}"#.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        Prompt {
            system: "s".into(),
            user: "u".into(),
        }
    }

    #[tokio::test]
    async fn test_stub_records_prompts() {
        let stub = StubCompletion::replying("{}");
        assert_eq!(stub.calls(), 0);
        assert_eq!(stub.complete(&prompt()).await.unwrap(), "{}");
        assert_eq!(stub.calls(), 1);
        assert_eq!(stub.prompts()[0].user, "u");
    }

    #[tokio::test]
    async fn test_stub_failure_replies() {
        let stub = StubCompletion::new(StubReply::Rejected {
            status: 401,
            detail: "bad key".into(),
        });
        assert!(matches!(
            stub.complete(&prompt()).await,
            Err(GatewayError::UpstreamRejected { status: 401, .. })
        ));
        assert_eq!(stub.calls(), 1);
    }
}
