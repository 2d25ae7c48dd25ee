//! LLM integration for price estimation.
//!
//! Defines the `CompletionClient` trait (the gateway's only network
//! egress) and the OpenAI-compatible implementation behind it.

pub mod openai;
pub mod prompt;

use async_trait::async_trait;

use crate::types::GatewayError;
pub use prompt::Prompt;

/// Abstraction over chat-completion backends.
///
/// Implementors send the system and user messages with their fixed
/// invocation settings and return the raw completion text, or a
/// classified failure (`UpstreamUnreachable`, `UpstreamRejected`,
/// `EmptyCompletion`). Nothing is retried here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, GatewayError>;
}
