use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ratify_kernel::coordinator::{FanOut, RetryPolicy};
use ratify_kernel::Participant;
use ratify_node::config::{NodeConfig, Role};
use ratify_node::server::{build_coordinator_router, build_participant_router};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn call(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn participant_app() -> Router {
    build_participant_router(Arc::new(Participant::in_memory("P1")))
}

fn coordinator_app() -> Router {
    let config = NodeConfig {
        role: Role::Coordinator,
        node_id: "COORD".into(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        wal_path: None,
        // Nothing listens here; votes come back NO_TIMEOUT.
        participants: vec!["http://127.0.0.1:9".into()],
        call_timeout: Duration::from_millis(200),
        retry: RetryPolicy::none(),
        fan_out: FanOut::Sequential,
    };
    build_coordinator_router(Arc::new(ratify_node::build_coordinator(&config).unwrap()))
}

#[tokio::test]
async fn test_prepare_votes() {
    let app = participant_app();
    let (status, body) = call(
        &app,
        "POST",
        "/prepare",
        r#"{"txid":"TX1","op":{"type":"SET","key":"x","value":"5"}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vote"], "YES");
    assert_eq!(body["state"], "READY");

    let (status, body) = call(&app, "POST", "/can_commit", r#"{"txid":"TX2","op":{"type":"DEL","key":"x"}}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vote"], "NO");
    assert_eq!(body["state"], "ABORTED");
}

#[tokio::test]
async fn test_validation_errors() {
    let app = participant_app();

    let (status, body) = call(&app, "POST", "/prepare", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"ok": false, "error": "invalid json"}));

    let (status, body) = call(&app, "POST", "/prepare", r#"{"txid":"TX1"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "txid and op required");

    let (status, _) = call(&app, "POST", "/prepare", r#"{"txid":"TX1","op":"SET x 5"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(&app, "POST", "/abort", r#"{"txid":"  "}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn test_state_conflicts() {
    let app = participant_app();

    let (status, body) = call(&app, "POST", "/precommit", r#"{"txid":"TX1"}"#).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "precommit requires READY state");
    assert!(body.get("state").is_none());

    let (status, _) = call(&app, "POST", "/abort", r#"{"txid":"TX1"}"#).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "POST", "/commit", r#"{"txid":"TX1"}"#).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "cannot commit from state=ABORTED");
    assert_eq!(body["state"], "ABORTED");
}

#[tokio::test]
async fn test_abort_unknown_creates_record() {
    let app = participant_app();
    let (status, body) = call(&app, "POST", "/abort", r#"{"txid":"GHOST"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ABORTED");

    let (status, body) = call(&app, "GET", "/status", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["node"], "P1");
    assert_eq!(body["tx"]["GHOST"]["state"], "ABORTED");
}

#[tokio::test]
async fn test_unknown_route() {
    let (status, body) = call(&participant_app(), "POST", "/frobnicate", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"ok": false, "error": "not found"}));
}

#[tokio::test]
async fn test_start_validation() {
    let app = coordinator_app();

    let (status, body) = call(&app, "POST", "/tx/start", r#"{"txid":"","op":{"type":"SET","key":"x"}}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "txid and op required");

    let (status, body) = call(
        &app,
        "POST",
        "/tx/start",
        r#"{"txid":"TX1","protocol":"4PC","op":{"type":"SET","key":"x"}}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "protocol must be 2PC or 3PC");

    let (status, body) = call(&app, "GET", "/status", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tx"], json!([]));
}

#[tokio::test]
async fn test_start_duplicate_txid() {
    let app = coordinator_app();
    let payload = r#"{"txid":"TX1","op":{"type":"SET","key":"x","value":"1"}}"#;

    let (status, body) = call(&app, "POST", "/tx/start", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["protocol"], "2PC");
    assert_eq!(body["decision"], "ABORT");
    assert_eq!(body["votes"]["http://127.0.0.1:9"], "NO_TIMEOUT");

    let (status, body) = call(&app, "POST", "/tx/start", payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "transaction TX1 already exists");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (status, _) = call(&participant_app(), "GET", "/metrics", "").await;
    assert_eq!(status, StatusCode::OK);
}
