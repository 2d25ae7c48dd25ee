//! OpenAI-compatible chat completions client.
//!
//! Implements `CompletionClient` against `{base_url}/chat/completions`.
//! Works with OpenAI itself and with compatible routers (OpenRouter etc.)
//! by pointing `llm.base_url` elsewhere. Invocation settings come from
//! `LlmConfig` once, at construction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CompletionClient, Prompt};
use crate::config::LlmConfig;
use crate::types::GatewayError;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct OpenAiClient {
    http: Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    seed: Option<u64>,
    json_mode: bool,
}

impl OpenAiClient {
    pub fn new(api_key: SecretString, config: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self {
            http,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            seed: config.send_seed.then_some(config.seed),
            json_mode: config.json_mode,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Model identifier string.
    pub fn model_name(&self) -> &str {
        &self.model
    }

    fn build_request<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            seed: self.seed,
            max_tokens: self.max_tokens,
            response_format: self.json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }

    /// Pull the upstream's own error message out of a non-success body,
    /// falling back to the raw body.
    fn rejection_detail(body: &str) -> String {
        serde_json::from_str::<ApiError>(body)
            .ok()
            .and_then(|e| e.error)
            .map(|e| e.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| body.trim().to_string())
    }

    /// Extract the completion text from a success envelope.
    ///
    /// Every failure keeps the full envelope for the logs.
    fn extract_text(body: &str, max_tokens: u32) -> Result<String, GatewayError> {
        let empty = |reason: String| GatewayError::EmptyCompletion {
            reason,
            raw: body.to_string(),
        };

        let envelope: ChatResponse = serde_json::from_str(body)
            .map_err(|e| empty(format!("response envelope could not be decoded: {e}")))?;

        if let Some(usage) = &envelope.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Completion usage"
            );
        }

        let choice = envelope
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| empty("no choices returned".into()))?;

        match choice.finish_reason.as_deref() {
            Some("length") => warn!(
                max_tokens,
                "Completion hit the output ceiling; the price map may be truncated"
            ),
            Some("content_filter") => return Err(empty("content filtered".into())),
            _ => {}
        }

        let message = choice
            .message
            .ok_or_else(|| empty("choice has no message".into()))?;

        if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
            return Err(empty(format!("model refused: {refusal}")));
        }

        match message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(empty("message content is empty".into())),
        }
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::UpstreamUnreachable {
        timed_out: e.is_timeout(),
        message: e.to_string(),
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &Prompt) -> Result<String, GatewayError> {
        let request = self.build_request(prompt);

        debug!(model = %self.model, endpoint = %self.endpoint, "Requesting completion");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            // The status is authoritative even when the body never arrives.
            let body = response.text().await.unwrap_or_else(|e| {
                debug!(error = %e, "Could not read rejection body");
                String::new()
            });
            return Err(GatewayError::UpstreamRejected {
                status: status.as_u16(),
                detail: Self::rejection_detail(&body),
            });
        }

        let body = response.text().await.map_err(transport_error)?;

        let text = Self::extract_text(&body, self.max_tokens)?;
        info!(model = %self.model, chars = text.len(), "Completion received");
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
