// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use ratify_kernel::{Coordinator, Operation, Participant, Protocol};
use tower_http::trace::TraceLayer;

use crate::api::*;
use crate::errors::ApiError;
use crate::network::HttpParticipant;

pub type HttpCoordinator = Coordinator<HttpParticipant>;
pub type SharedCoordinator = Arc<HttpCoordinator>;
pub type SharedParticipant = Arc<Participant>;

pub fn build_participant_router(state: SharedParticipant) -> Router {
    Router::new()
        .route("/prepare", post(prepare))
        .route("/can_commit", post(can_commit))
        .route("/precommit", post(precommit))
        .route("/commit", post(commit))
        .route("/abort", post(abort))
        .route("/status", get(participant_status))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub fn build_coordinator_router(state: SharedCoordinator) -> Router {
    Router::new()
        .route("/tx/start", post(start_transaction))
        .route("/status", get(coordinator_status))
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// The HTTP boundary requires an object payload; the participant then
// votes NO on objects it cannot interpret.
fn require_op(txid: &str, op: Option<serde_json::Value>) -> Result<Operation, ApiError> {
    match op.and_then(Operation::from_value) {
        Some(op) if !txid.trim().is_empty() => Ok(op),
        _ => Err(ApiError::InvalidInput("txid and op required".to_string())),
    }
}

// ---- participant ----

async fn prepare(
    State(state): State<SharedParticipant>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, ApiError> {
    let Json(req) = payload?;
    let op = require_op(&req.txid, req.op)?;
    let outcome = state.prepare(&req.txid, Some(op))?;
    Ok(Json(VoteResponse {
        ok: true,
        txid: req.txid.trim().to_string(),
        vote: outcome.vote,
        state: outcome.state,
    }))
}

async fn can_commit(
    State(state): State<SharedParticipant>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, ApiError> {
    let Json(req) = payload?;
    let op = require_op(&req.txid, req.op)?;
    let outcome = state.can_commit(&req.txid, Some(op))?;
    Ok(Json(VoteResponse {
        ok: true,
        txid: req.txid.trim().to_string(),
        vote: outcome.vote,
        state: outcome.state,
    }))
}

async fn precommit(
    State(state): State<SharedParticipant>,
    payload: Result<Json<TxRequest>, JsonRejection>,
) -> Result<Json<StateResponse>, ApiError> {
    let Json(req) = payload?;
    let new_state = state.precommit(&req.txid)?;
    Ok(Json(StateResponse {
        ok: true,
        txid: req.txid.trim().to_string(),
        state: new_state,
    }))
}

async fn commit(
    State(state): State<SharedParticipant>,
    payload: Result<Json<TxRequest>, JsonRejection>,
) -> Result<Json<StateResponse>, ApiError> {
    let Json(req) = payload?;
    let new_state = state.commit(&req.txid)?;
    Ok(Json(StateResponse {
        ok: true,
        txid: req.txid.trim().to_string(),
        state: new_state,
    }))
}

async fn abort(
    State(state): State<SharedParticipant>,
    payload: Result<Json<TxRequest>, JsonRejection>,
) -> Result<Json<StateResponse>, ApiError> {
    let Json(req) = payload?;
    let new_state = state.abort(&req.txid)?;
    Ok(Json(StateResponse {
        ok: true,
        txid: req.txid.trim().to_string(),
        state: new_state,
    }))
}

async fn participant_status(State(state): State<SharedParticipant>) -> Json<ParticipantStatusResponse> {
    let status = state.status();
    Json(ParticipantStatusResponse {
        ok: true,
        node: status.node_id,
        kv: status.store,
        tx: status.transactions.into_iter().map(|r| (r.txid.clone(), r)).collect(),
        wal: status.wal,
    })
}

// ---- coordinator ----

async fn start_transaction(
    State(state): State<SharedCoordinator>,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<StartResponse>, ApiError> {
    let Json(req) = payload?;
    let op = require_op(&req.txid, req.op)?;
    let protocol: Protocol = req
        .protocol
        .as_deref()
        .unwrap_or("2PC")
        .parse()
        .map_err(ApiError::InvalidInput)?;

    let outcome = state.start(&req.txid, protocol, Some(op)).await?;
    Ok(Json(StartResponse {
        ok: true,
        txid: outcome.txid,
        protocol: outcome.protocol,
        decision: outcome.decision,
        votes: outcome.votes,
    }))
}

async fn coordinator_status(State(state): State<SharedCoordinator>) -> Json<CoordinatorStatusResponse> {
    let status = state.status();
    Json(CoordinatorStatusResponse {
        ok: true,
        node: status.node_id,
        participants: status.participants,
        tx: status.transactions,
    })
}

// ---- shared ----

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}
