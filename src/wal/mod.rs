// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Write-Ahead Log
//!
//! One text line per state transition:
//!
//! ```text
//! <txid> <ACTION>[ <VOTE>][ <op-json>]
//! ```
//!
//! - Appends are flushed and fsync'd before the caller may acknowledge.
//! - The operation payload, when present, is always the last field.
//! - No compaction; the file only grows.

pub mod reader;
pub mod writer;

use core::fmt;
use thiserror::Error;

use crate::types::{Operation, Vote};

pub use reader::WalReader;
pub use writer::WalWriter;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed log line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

pub type WalResult<T> = Result<T, WalError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogAction {
    Prepare,
    CanCommit,
    PreCommit,
    Commit,
    Abort,
    /// Coordinator only: the protocol run finished.
    Done,
}

impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Prepare => "PREPARE",
            LogAction::CanCommit => "CAN_COMMIT",
            LogAction::PreCommit => "PRECOMMIT",
            LogAction::Commit => "COMMIT",
            LogAction::Abort => "ABORT",
            LogAction::Done => "DONE",
        }
    }

    pub fn parse(token: &str) -> Option<LogAction> {
        match token {
            "PREPARE" => Some(LogAction::Prepare),
            "CAN_COMMIT" => Some(LogAction::CanCommit),
            "PRECOMMIT" => Some(LogAction::PreCommit),
            "COMMIT" => Some(LogAction::Commit),
            "ABORT" => Some(LogAction::Abort),
            "DONE" => Some(LogAction::Done),
            _ => None,
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single decoded log line.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub txid: String,
    pub action: LogAction,
    pub vote: Option<Vote>,
    pub op: Option<Operation>,
}

impl LogRecord {
    pub fn new(txid: impl Into<String>, action: LogAction) -> Self {
        Self {
            txid: txid.into(),
            action,
            vote: None,
            op: None,
        }
    }

    pub fn with_vote(mut self, vote: Vote) -> Self {
        self.vote = Some(vote);
        self
    }

    pub fn with_op(mut self, op: Option<Operation>) -> Self {
        self.op = op;
        self
    }

    /// Renders the line without its trailing newline.
    pub fn encode(&self) -> String {
        let mut line = format!("{} {}", self.txid, self.action);
        if let Some(vote) = self.vote {
            line.push(' ');
            line.push_str(vote.as_str());
        }
        if let Some(op) = &self.op {
            line.push(' ');
            line.push_str(&op.to_json());
        }
        line
    }

    /// Parses one line. `line_no` is only used for error reporting.
    pub fn decode(line: &str, line_no: usize) -> WalResult<Self> {
        let malformed = |reason: &str| WalError::Malformed {
            line: line_no,
            reason: reason.to_string(),
        };

        let mut parts = line.trim().splitn(3, ' ');
        let txid = parts.next().filter(|t| !t.is_empty()).ok_or_else(|| malformed("missing txid"))?;
        let action = parts.next().ok_or_else(|| malformed("missing action"))?;
        let action = LogAction::parse(action).ok_or_else(|| malformed("unknown action"))?;

        let mut record = LogRecord::new(txid, action);
        let mut rest = parts.next().unwrap_or("").trim();

        let (head, tail) = rest.split_once(' ').unwrap_or((rest, ""));
        if let Some(vote) = Vote::parse(head) {
            record.vote = Some(vote);
            rest = tail.trim();
        }

        if !rest.is_empty() {
            let op = Operation::from_json(rest).map_err(|e| malformed(&format!("bad operation: {}", e)))?;
            record.op = Some(op);
        }

        Ok(record)
    }
}
