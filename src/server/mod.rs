//! HTTP boundary — Axum router for the pricing gateway.
//!
//! One pricing route plus a health probe. Every response carries
//! permissive CORS headers restricted to `POST, OPTIONS` and
//! `Content-Type`.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use routes::{AppState, GatewayState};

/// Path of the pricing endpoint.
pub const PRICING_PATH: &str = "/api/ai-pricing";

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(
            PRICING_PATH,
            // OPTIONS never reaches the router: CorsLayer answers every
            // preflight with 200 and an empty body.
            post(routes::price_items).fallback(routes::method_not_allowed),
        )
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // CorsLayer only adds methods/headers on preflight; callers expect
        // all three on every response.
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, addr: SocketAddr, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, path = PRICING_PATH, "Pricing gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Pricing gateway server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
