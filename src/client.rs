// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Coordinator-to-participant RPC boundary.
//!
//! The coordinator is generic over [`ParticipantClient`]. The node crate
//! provides an HTTP implementation; [`LocalParticipant`] calls a
//! [`Participant`] in the same process.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CommitError;
use crate::participant::Participant;
use crate::types::{Operation, ParticipantState, Vote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReply {
    pub vote: Vote,
    pub state: ParticipantState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateReply {
    pub state: ParticipantState,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("call timed out")]
    Timeout,

    #[error("participant unreachable: {0}")]
    Unreachable(String),

    /// The participant answered, with an error. `state` is its current
    /// state for the transaction when it reported one.
    #[error("participant rejected call ({status}): {message}")]
    Rejected {
        status: u16,
        message: String,
        state: Option<ParticipantState>,
    },

    #[error("malformed reply: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Worth another attempt: the call may not have reached the participant.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcError::Timeout | RpcError::Unreachable(_))
    }
}

pub trait ParticipantClient: Send + Sync {
    /// Stable identifier used as the key of vote and delivery maps.
    fn address(&self) -> &str;

    fn prepare(&self, txid: &str, op: &Operation) -> impl Future<Output = Result<VoteReply, RpcError>> + Send;

    fn can_commit(&self, txid: &str, op: &Operation) -> impl Future<Output = Result<VoteReply, RpcError>> + Send;

    fn precommit(&self, txid: &str) -> impl Future<Output = Result<StateReply, RpcError>> + Send;

    fn commit(&self, txid: &str) -> impl Future<Output = Result<StateReply, RpcError>> + Send;

    fn abort(&self, txid: &str) -> impl Future<Output = Result<StateReply, RpcError>> + Send;
}

/// In-process client.
#[derive(Clone)]
pub struct LocalParticipant {
    address: String,
    participant: Arc<Participant>,
}

impl LocalParticipant {
    pub fn new(participant: Arc<Participant>) -> Self {
        Self {
            address: participant.node_id().to_string(),
            participant,
        }
    }

    pub fn participant(&self) -> &Arc<Participant> {
        &self.participant
    }
}

fn rejected(err: CommitError) -> RpcError {
    let status = match &err {
        CommitError::Validation(_) => 400,
        e if e.is_conflict() => 409,
        _ => 500,
    };
    RpcError::Rejected {
        status,
        message: err.to_string(),
        state: err.participant_state(),
    }
}

impl ParticipantClient for LocalParticipant {
    fn address(&self) -> &str {
        &self.address
    }

    async fn prepare(&self, txid: &str, op: &Operation) -> Result<VoteReply, RpcError> {
        let outcome = self.participant.prepare(txid, Some(op.clone())).map_err(rejected)?;
        Ok(VoteReply { vote: outcome.vote, state: outcome.state })
    }

    async fn can_commit(&self, txid: &str, op: &Operation) -> Result<VoteReply, RpcError> {
        let outcome = self.participant.can_commit(txid, Some(op.clone())).map_err(rejected)?;
        Ok(VoteReply { vote: outcome.vote, state: outcome.state })
    }

    async fn precommit(&self, txid: &str) -> Result<StateReply, RpcError> {
        let state = self.participant.precommit(txid).map_err(rejected)?;
        Ok(StateReply { state })
    }

    async fn commit(&self, txid: &str) -> Result<StateReply, RpcError> {
        let state = self.participant.commit(txid).map_err(rejected)?;
        Ok(StateReply { state })
    }

    async fn abort(&self, txid: &str) -> Result<StateReply, RpcError> {
        let state = self.participant.abort(txid).map_err(rejected)?;
        Ok(StateReply { state })
    }
}

impl<T: ParticipantClient> ParticipantClient for Arc<T> {
    fn address(&self) -> &str {
        (**self).address()
    }

    async fn prepare(&self, txid: &str, op: &Operation) -> Result<VoteReply, RpcError> {
        (**self).prepare(txid, op).await
    }

    async fn can_commit(&self, txid: &str, op: &Operation) -> Result<VoteReply, RpcError> {
        (**self).can_commit(txid, op).await
    }

    async fn precommit(&self, txid: &str) -> Result<StateReply, RpcError> {
        (**self).precommit(txid).await
    }

    async fn commit(&self, txid: &str) -> Result<StateReply, RpcError> {
        (**self).commit(txid).await
    }

    async fn abort(&self, txid: &str) -> Result<StateReply, RpcError> {
        (**self).abort(txid).await
    }
}
