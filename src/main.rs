//! Pricing gateway — entry point.
//!
//! Loads configuration, initialises structured logging, builds the
//! completion client from explicit credentials and serves the HTTP
//! gateway until Ctrl+C.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;

use pricing_gateway::config::{self, AppConfig};
use pricing_gateway::llm::openai::OpenAiClient;
use pricing_gateway::server::{self, GatewayState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_default()?;

    init_logging();

    let api_key = AppConfig::resolve_env(&cfg.llm.api_key_env)
        .context("Upstream API key missing; set it in the environment or .env")?;
    let client = OpenAiClient::new(SecretString::new(api_key), &cfg.llm)?;

    info!(
        model = %client.model_name(),
        endpoint = %client.endpoint(),
        temperature = cfg.llm.temperature,
        seed = cfg.llm.seed,
        send_seed = cfg.llm.send_seed,
        max_tokens = cfg.llm.max_tokens,
        json_mode = cfg.llm.json_mode,
        "Completion client configured"
    );

    let state = Arc::new(GatewayState::new(Arc::new(client)));
    let addr = cfg.server.socket_addr()?;

    server::serve(state, addr, shutdown_signal()).await?;

    info!("Pricing gateway shut down cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received.");
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pricing_gateway=info,tower_http=info"));

    if std::env::var(config::LOG_JSON_ENV).is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
