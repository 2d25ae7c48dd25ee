//! Pricing route handlers and the error → HTTP mapping.
//!
//! All responses are JSON. State is shared via `Arc<GatewayState>` and
//! holds nothing mutable.

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::llm::{prompt, CompletionClient};
use crate::recovery;
use crate::request;
use crate::types::{GatewayError, PriceEstimate};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct GatewayState {
    pub client: Arc<dyn CompletionClient>,
}

impl GatewayState {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }
}

pub type AppState = Arc<GatewayState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl GatewayError {
    /// HTTP status for this failure.
    ///
    /// Upstream 429/503 are passed through so callers can back off; any
    /// other upstream rejection is the gateway's problem, not the caller's.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::UpstreamUnreachable { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamUnreachable { timed_out: false, .. } => StatusCode::BAD_GATEWAY,
            Self::UpstreamRejected { status: 429, .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UpstreamRejected { status: 503, .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamRejected { .. } => StatusCode::BAD_GATEWAY,
            Self::EmptyCompletion { .. } | Self::RecoveryExhausted { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn log(&self) {
        match self {
            Self::Validation(msg) => warn!(kind = self.kind(), error = %msg, "Rejected pricing request"),
            Self::MethodNotAllowed(method) => warn!(kind = self.kind(), method = %method, "Method not allowed"),
            Self::UpstreamRejected { status, detail } => error!(
                kind = self.kind(),
                upstream_status = *status,
                detail = %detail,
                "Completion API rejected the request"
            ),
            Self::EmptyCompletion { reason, raw } => error!(
                kind = self.kind(),
                reason = %reason,
                raw = %raw,
                "Completion API returned no usable text"
            ),
            Self::RecoveryExhausted { raw } => error!(
                kind = self.kind(),
                raw = %raw,
                "Completion text contained no parseable price map"
            ),
            _ => error!(kind = self.kind(), error = %self, "Pricing request failed"),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.public_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Validate → build prompt → complete → recover.
///
/// The upstream call is the only await; an invalid body returns before
/// it is made.
pub async fn estimate_prices(
    client: &dyn CompletionClient,
    body: &[u8],
) -> Result<PriceEstimate, GatewayError> {
    let request = request::validate(body)?;
    info!(items = request.items.len(), "Pricing request accepted");

    let prompt = prompt::build(&request);
    let raw = client.complete(&prompt).await?;
    let estimate = recovery::recover(&raw, &request)?;

    info!(
        priced = estimate.prices.len(),
        missing = estimate.missing.len(),
        dropped = estimate.dropped.len(),
        "Price estimate complete"
    );
    Ok(estimate)
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/ai-pricing
#[instrument(name = "price_request", skip_all, fields(request_id = %Uuid::new_v4()))]
pub async fn price_items(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PriceEstimate>, GatewayError> {
    estimate_prices(state.client.as_ref(), &body)
        .await
        .map(Json)
        .inspect_err(GatewayError::log)
}

/// Any other method on the pricing path.
pub async fn method_not_allowed(method: Method) -> GatewayError {
    let err = GatewayError::MethodNotAllowed(method.to_string());
    err.log();
    err
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
