// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::collections::BTreeMap;
use std::path::PathBuf;

use ratify_kernel::participant::{KvStore, ParticipantRecord};
use ratify_kernel::{Decision, ParticipantState, Protocol, TransactionRecord, Vote};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// Fields default so that a missing txid or op is reported by validation
// rather than as a JSON decode failure.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub op: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRequest {
    #[serde(default)]
    pub txid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub ok: bool,
    pub txid: String,
    pub vote: Vote,
    pub state: ParticipantState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub ok: bool,
    pub txid: String,
    pub state: ParticipantState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub op: Option<Value>,
    /// `2PC` when absent.
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub ok: bool,
    pub txid: String,
    pub protocol: Protocol,
    pub decision: Decision,
    pub votes: BTreeMap<String, Vote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantStatusResponse {
    pub ok: bool,
    pub node: String,
    pub kv: KvStore,
    pub tx: BTreeMap<String, ParticipantRecord>,
    pub wal: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatusResponse {
    pub ok: bool,
    pub node: String,
    pub participants: Vec<String>,
    pub tx: Vec<TransactionRecord>,
}
