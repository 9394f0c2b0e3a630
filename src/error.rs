// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

use crate::types::ParticipantState;
use crate::wal::WalError;

#[derive(Error, Debug)]
pub enum CommitError {
    /// Malformed request. The transaction is never registered.
    #[error("{0}")]
    Validation(String),

    #[error("unknown txid")]
    UnknownTransaction,

    #[error("precommit requires READY state")]
    PrecommitRequiresReady { current: Option<ParticipantState> },

    #[error("cannot commit from state={from}")]
    IllegalTransition { from: ParticipantState },

    #[error("no buffered operation for txid {0}")]
    MissingOperation(String),

    #[error("transaction {0} already exists")]
    DuplicateTransaction(String),

    #[error("transaction {0} already has a decision")]
    AlreadyDecided(String),

    /// The transition could not be logged and must not be acknowledged.
    #[error("durability failure: {0}")]
    Durability(#[from] WalError),
}

impl CommitError {
    /// Conflicts are logic errors on the caller's side: the target state
    /// is left unchanged.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CommitError::UnknownTransaction
                | CommitError::PrecommitRequiresReady { .. }
                | CommitError::IllegalTransition { .. }
                | CommitError::MissingOperation(_)
                | CommitError::DuplicateTransaction(_)
                | CommitError::AlreadyDecided(_)
        )
    }

    /// The participant's state when a transition was refused, if the
    /// transaction is known.
    pub fn participant_state(&self) -> Option<ParticipantState> {
        match self {
            CommitError::IllegalTransition { from } => Some(*from),
            CommitError::PrecommitRequiresReady { current } => *current,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommitError>;

/// Validates and normalizes a transaction identifier.
///
/// Log lines are space-delimited, so identifiers may not contain
/// whitespace.
pub fn validate_txid(txid: &str) -> Result<String> {
    let txid = txid.trim();
    if txid.is_empty() {
        return Err(CommitError::Validation("txid is required".to_string()));
    }
    if txid.chars().any(char::is_whitespace) {
        return Err(CommitError::Validation("txid must not contain whitespace".to_string()));
    }
    Ok(txid.to_string())
}
