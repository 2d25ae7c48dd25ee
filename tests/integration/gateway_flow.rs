//! End-to-end pricing scenarios through the HTTP router.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use pricing_gateway::config::LlmConfig;
use pricing_gateway::llm::openai::OpenAiClient;
use pricing_gateway::llm::CompletionClient;
use pricing_gateway::server::{build_router, GatewayState, PRICING_PATH};

use crate::fake_upstream::FakeUpstream;
use crate::stub_completion::{StubCompletion, StubReply};

async fn post_pricing(
    client: Arc<dyn CompletionClient>,
    body: Value,
) -> (StatusCode, Value) {
    let app = build_router(Arc::new(GatewayState::new(client)));
    let resp = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(PRICING_PATH)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = resp.status();
    assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    let bytes = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn paint_body() -> Value {
    json!({"items": [{"cat": "Paint", "label": "Interior Walls", "method": "per-sqft"}]})
}

#[tokio::test]
async fn test_fenced_completion_scenario() {
    let stub = Arc::new(StubCompletion::replying(
        "```json\n{\"prices\":{\"Paint|Interior Walls\":{\"labor\":1.5,\"material\":0.8}}}\n```",
    ));
    let (status, body) = post_pricing(stub.clone(), paint_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"prices": {"Paint|Interior Walls": {"labor": 1.5, "material": 0.8}}})
    );
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_empty_items_never_reaches_upstream() {
    let stub = Arc::new(StubCompletion::replying("{}"));
    let (status, body) = post_pricing(stub.clone(), json!({"items": []})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_bad_method_never_reaches_upstream() {
    let stub = Arc::new(StubCompletion::replying("{}"));
    let body = json!({"items": [{"cat": "Paint", "label": "Trim", "method": "hourly"}]});
    let (status, _) = post_pricing(stub.clone(), body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_rate_limited_upstream() {
    let stub = Arc::new(StubCompletion::new(StubReply::Rejected {
        status: 429,
        detail: "Rate limit reached".into(),
    }));
    let (status, body) = post_pricing(stub, paint_body()).await;

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let msg = body["error"].as_str().unwrap();
    assert!(!msg.contains("Rate limit reached"));
}

#[tokio::test]
async fn test_bad_credentials_is_502() {
    let stub = Arc::new(StubCompletion::new(StubReply::Rejected {
        status: 401,
        detail: "Incorrect API key provided".into(),
    }));
    let (status, _) = post_pricing(stub, paint_body()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_unreachable_and_timeout() {
    let refused = Arc::new(StubCompletion::new(StubReply::Unreachable { timed_out: false }));
    assert_eq!(post_pricing(refused, paint_body()).await.0, StatusCode::BAD_GATEWAY);

    let timed_out = Arc::new(StubCompletion::new(StubReply::Unreachable { timed_out: true }));
    assert_eq!(post_pricing(timed_out, paint_body()).await.0, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_empty_completion_is_502() {
    let stub = Arc::new(StubCompletion::new(StubReply::Empty));
    let (status, body) = post_pricing(stub, paint_body()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(!error.contains("choices"));
}

#[tokio::test]
async fn test_prose_completion_is_502_without_raw_text() {
    let prose = "Painting costs depend on many factors such as wall condition.";
    let stub = Arc::new(StubCompletion::replying(prose));
    let (status, body) = post_pricing(stub, paint_body()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.to_string().contains("wall condition"));
}

#[tokio::test]
async fn test_partial_result_is_surfaced() {
    let stub = Arc::new(StubCompletion::replying(
        r#"Sure! {"Paint|Interior Walls": {"labor": 1.5, "material": 0.8},
                  "Floor|LVP": {"labor": "about 2", "material": 3.1},
                  "Paint|Ceilings": {"labor": 2.0, "material": 0.9}}"#,
    ));
    let body = json!({"items": [
        {"cat": "Paint", "label": "Interior Walls", "method": "per-sqft"},
        {"cat": "Floor", "label": "LVP", "method": "per-sqft"},
        {"cat": "Demo", "label": "Haul Away", "method": "total"}
    ]});
    let (status, body) = post_pricing(stub, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prices"].as_object().unwrap().len(), 1);
    assert_eq!(body["missing"], json!(["Floor|LVP", "Demo|Haul Away"]));
    assert_eq!(body["dropped"], json!(["Paint|Ceilings", "Floor|LVP"]));
}

#[tokio::test]
async fn test_prompt_lists_items_and_context() {
    let stub = Arc::new(StubCompletion::replying(
        r#"{"Demo|Haul Away": {"labor": 450, "material": 0}}"#,
    ));
    let body = json!({
        "items": [{"cat": "Demo", "label": "Haul Away", "method": "total"}],
        "context": "Salt Lake City bungalow"
    });
    let (status, _) = post_pricing(stub.clone(), body).await;
    assert_eq!(status, StatusCode::OK);

    let prompts = stub.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].user.contains("Demo|Haul Away [total]"));
    assert!(prompts[0].user.contains("Project context: Salt Lake City bungalow"));
}

#[tokio::test]
async fn test_identical_requests_send_identical_prompts() {
    let stub = Arc::new(StubCompletion::replying("{}"));
    post_pricing(stub.clone(), paint_body()).await;
    post_pricing(stub.clone(), paint_body()).await;

    let prompts = stub.prompts();
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn test_full_stack_with_http_upstream() {
    let content = "Here you go:\n{\"Paint|Interior Walls\":{\"labor\":1.5,\"material\":0.8}}";
    let upstream = FakeUpstream::start(200, &FakeUpstream::envelope(content)).await;
    let cfg = LlmConfig {
        base_url: upstream.base_url(),
        timeout_secs: 10,
        ..LlmConfig::default()
    };
    let client = Arc::new(OpenAiClient::new(SecretString::new("sk-test".into()), &cfg).unwrap());

    let (status, body) = post_pricing(client, paint_body()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prices"]["Paint|Interior Walls"]["material"], 0.8);
}

#[tokio::test]
async fn test_full_stack_upstream_429() {
    let upstream = FakeUpstream::start(429, r#"{"error":{"message":"slow down"}}"#).await;
    let cfg = LlmConfig {
        base_url: upstream.base_url(),
        timeout_secs: 10,
        ..LlmConfig::default()
    };
    let client = Arc::new(OpenAiClient::new(SecretString::new("sk-test".into()), &cfg).unwrap());

    let (status, body) = post_pricing(client, paint_body()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_string());
}
