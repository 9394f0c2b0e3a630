// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Coordinator-side transaction record.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{now_ms, CoordinatorState, Decision, DeliveryStatus, Operation, Protocol, Vote};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRecord {
    pub txid: String,
    pub protocol: Protocol,
    pub op: Operation,
    pub state: CoordinatorState,
    /// Keyed by participant address.
    pub votes: BTreeMap<String, Vote>,
    /// Set exactly once.
    pub decision: Option<Decision>,
    /// Decision delivery progress, keyed by participant address.
    pub deliveries: BTreeMap<String, DeliveryStatus>,
    /// Captured at start; never changes.
    pub participants: Vec<String>,
    pub created_at_ms: u64,
}

impl TransactionRecord {
    pub fn new(txid: String, protocol: Protocol, op: Operation, participants: Vec<String>) -> Self {
        let state = match protocol {
            Protocol::TwoPhase => CoordinatorState::PrepareSent,
            Protocol::ThreePhase => CoordinatorState::CanCommitSent,
        };
        Self {
            txid,
            protocol,
            op,
            state,
            votes: BTreeMap::new(),
            decision: None,
            deliveries: BTreeMap::new(),
            participants,
            created_at_ms: now_ms(),
        }
    }

    /// Records the decision. Returns `false`, leaving the record as is,
    /// if a decision was already recorded.
    pub fn decide(&mut self, decision: Decision) -> bool {
        if self.decision.is_some() {
            return false;
        }
        self.decision = Some(decision);
        true
    }

    pub fn is_done(&self) -> bool {
        self.state == CoordinatorState::Done
    }
}

/// Result of a completed protocol run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub txid: String,
    pub protocol: Protocol,
    pub decision: Decision,
    pub votes: BTreeMap<String, Vote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub node_id: String,
    pub participants: Vec<String>,
    /// Ordered by creation.
    pub transactions: Vec<TransactionRecord>,
}
