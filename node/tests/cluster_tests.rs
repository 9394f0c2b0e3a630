use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::{Json, Router};
use ratify_kernel::coordinator::{FanOut, RetryPolicy};
use ratify_kernel::{DeliveryStatus, Participant, ParticipantConfig};
use ratify_node::config::{NodeConfig, Role};
use ratify_node::server::{build_coordinator_router, build_participant_router};
use serde_json::{json, Value};
use tempfile::tempdir;
use tokio::net::TcpListener;

// Integration tests: real participant and coordinator servers on loopback.

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_participant(dir: &std::path::Path, id: &str) -> (String, Arc<Participant>) {
    let config = ParticipantConfig::new(id).with_wal(dir.join(format!("{}.wal", id)));
    let participant = Arc::new(Participant::open(config).unwrap());
    let url = spawn(build_participant_router(participant.clone())).await;
    (url, participant)
}

async fn spawn_coordinator(dir: &std::path::Path, participants: Vec<String>, fan_out: FanOut) -> String {
    let config = NodeConfig {
        role: Role::Coordinator,
        node_id: "COORD".into(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        wal_path: Some(dir.join("coordinator.wal")),
        participants,
        call_timeout: Duration::from_millis(500),
        retry: RetryPolicy::new().with_max_attempts(2).with_initial_backoff_ms(10).with_max_backoff_ms(20),
        fan_out,
    };
    let coordinator = ratify_node::build_coordinator(&config).unwrap();
    spawn(build_coordinator_router(Arc::new(coordinator))).await
}

/// A participant that always refuses.
async fn spawn_refusing_participant() -> String {
    let app = Router::new()
        .route(
            "/prepare",
            post(|| async { Json(json!({"ok": true, "vote": "NO", "state": "ABORTED"})) }),
        )
        .route(
            "/abort",
            post(|| async { Json(json!({"ok": true, "txid": "", "state": "ABORTED"})) }),
        );
    spawn(app).await
}

fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn start(coord: &str, txid: &str, protocol: &str) -> Value {
    let resp = reqwest::Client::new()
        .post(format!("{}/tx/start", coord))
        .json(&json!({
            "txid": txid,
            "protocol": protocol,
            "op": {"type": "SET", "key": "x", "value": "5"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_scenario_two_phase_commit() {
    let dir = tempdir().unwrap();
    let mut urls = Vec::new();
    let mut nodes = Vec::new();
    for id in ["A", "B", "C"] {
        let (url, p) = spawn_participant(dir.path(), id).await;
        urls.push(url);
        nodes.push(p);
    }
    let coord = spawn_coordinator(dir.path(), urls.clone(), FanOut::Sequential).await;

    let body = start(&coord, "TX1", "2PC").await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["decision"], "COMMIT");
    for url in &urls {
        assert_eq!(body["votes"][url.as_str()], "YES");
    }
    for p in &nodes {
        assert_eq!(p.value("x").as_deref(), Some("5"));
    }

    // Participant status reflects the commit.
    let status: Value = reqwest::get(format!("{}/status", urls[0])).await.unwrap().json().await.unwrap();
    assert_eq!(status["kv"]["x"], "5");
    assert_eq!(status["tx"]["TX1"]["state"], "COMMITTED");

    // Coordinator status carries deliveries.
    let status: Value = reqwest::get(format!("{}/status", coord)).await.unwrap().json().await.unwrap();
    assert_eq!(status["tx"][0]["state"], "DONE");
    assert_eq!(status["tx"][0]["deliveries"][urls[1].as_str()], "DELIVERED");
}

#[tokio::test]
async fn test_scenario_one_no_vote_aborts() {
    let dir = tempdir().unwrap();
    let (a, pa) = spawn_participant(dir.path(), "A").await;
    let refusing = spawn_refusing_participant().await;
    let (c, pc) = spawn_participant(dir.path(), "C").await;
    let coord = spawn_coordinator(dir.path(), vec![a, refusing.clone(), c], FanOut::Sequential).await;

    let body = start(&coord, "TX1", "2PC").await;
    assert_eq!(body["decision"], "ABORT");
    assert_eq!(body["votes"][refusing.as_str()], "NO");

    for p in [&pa, &pc] {
        assert!(p.store().is_empty());
        assert_eq!(p.state_of("TX1"), Some(ratify_kernel::ParticipantState::Aborted));
    }
}

#[tokio::test]
async fn test_scenario_three_phase_unreachable_aborts() {
    let dir = tempdir().unwrap();
    let (a, pa) = spawn_participant(dir.path(), "A").await;
    let (b, pb) = spawn_participant(dir.path(), "B").await;
    let dead = unreachable_url();
    let coord = spawn_coordinator(dir.path(), vec![a, b, dead.clone()], FanOut::Sequential).await;

    let body = start(&coord, "TX1", "3PC").await;
    assert_eq!(body["decision"], "ABORT");
    assert_eq!(body["votes"][dead.as_str()], "NO_TIMEOUT");

    for p in [&pa, &pb] {
        assert_eq!(p.state_of("TX1"), Some(ratify_kernel::ParticipantState::Aborted));
        assert!(p.store().is_empty());
    }

    let status: Value = reqwest::get(format!("{}/status", coord)).await.unwrap().json().await.unwrap();
    assert_eq!(status["tx"][0]["deliveries"][dead.as_str()], json!(DeliveryStatus::GivenUp));
}

#[tokio::test]
async fn test_scenario_three_phase_logs_each_state() {
    let dir = tempdir().unwrap();
    let mut urls = Vec::new();
    for id in ["A", "B", "C"] {
        urls.push(spawn_participant(dir.path(), id).await.0);
    }
    let coord = spawn_coordinator(dir.path(), urls, FanOut::Concurrent).await;

    let body = start(&coord, "TX1", "3pc").await;
    assert_eq!(body["protocol"], "3PC");
    assert_eq!(body["decision"], "COMMIT");

    for id in ["A", "B", "C"] {
        let log = std::fs::read_to_string(dir.path().join(format!("{}.wal", id))).unwrap();
        let actions: Vec<&str> = log.lines().map(|l| l.split(' ').nth(1).unwrap()).collect();
        assert_eq!(actions, vec!["CAN_COMMIT", "PRECOMMIT", "COMMIT"]);
    }
}

#[tokio::test]
async fn test_scenario_commit_unknown_txid() {
    let dir = tempdir().unwrap();
    let (url, p) = spawn_participant(dir.path(), "A").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/commit", url))
        .json(&json!({"txid": "TX1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"ok": false, "error": "unknown txid"}));
    assert!(p.store().is_empty());
}
