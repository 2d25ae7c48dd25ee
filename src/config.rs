//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` (or the file named by `PRICING_CONFIG`) and
//! deserializes into strongly-typed structs. The upstream API key is
//! referenced by env-var name and resolved at startup, never stored in
//! the file itself.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

/// Env var that overrides the config file path.
pub const CONFIG_PATH_ENV: &str = "PRICING_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// When set, logs are emitted as JSON lines.
pub const LOG_JSON_ENV: &str = "PRICING_LOG_JSON";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

/// Fixed invocation parameters for the completion API.
///
/// None of these vary per request.
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Output ceiling. Does not grow with the item count, so very long
    /// item lists can be truncated by the upstream.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Include `seed` in requests. Turn off for providers that reject it.
    #[serde(default = "default_send_seed")]
    pub send_seed: bool,
    /// Ask the upstream for `response_format: json_object`.
    #[serde(default = "default_json_mode")]
    pub json_mode: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            seed: default_seed(),
            send_seed: default_send_seed(),
            json_mode: default_json_mode(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_seed() -> u64 {
    42
}

fn default_send_seed() -> bool {
    true
}

fn default_json_mode() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    120
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `PRICING_CONFIG` if set, else `config.toml`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(&path)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }
        if self.llm.max_tokens == 0 {
            anyhow::bail!("llm.max_tokens must be positive");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be within 0.0..=2.0");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Used for the upstream API key referenced by `llm.api_key_env`.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        let value = std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))?;
        if value.trim().is_empty() {
            anyhow::bail!("Environment variable is empty: {env_name}");
        }
        Ok(value)
    }
}
