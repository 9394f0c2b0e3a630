// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Protocol vocabulary shared by coordinator and participant.

pub mod operation;

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub use operation::{Command, Operation};

/// Commit protocol variant selected per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "2PC")]
    TwoPhase,
    #[serde(rename = "3PC")]
    ThreePhase,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::TwoPhase => "2PC",
            Protocol::ThreePhase => "3PC",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "2PC" => Ok(Protocol::TwoPhase),
            "3PC" => Ok(Protocol::ThreePhase),
            _ => Err("protocol must be 2PC or 3PC".to_string()),
        }
    }
}

/// A participant's answer to the phase-1 query.
///
/// `NoTimeout` is never sent by a participant; the coordinator
/// synthesizes it when a call fails or times out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Vote {
    Yes,
    No,
    NoTimeout,
}

impl Vote {
    pub fn is_yes(&self) -> bool {
        matches!(self, Vote::Yes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Yes => "YES",
            Vote::No => "NO",
            Vote::NoTimeout => "NO_TIMEOUT",
        }
    }

    pub fn parse(token: &str) -> Option<Vote> {
        match token {
            "YES" => Some(Vote::Yes),
            "NO" => Some(Vote::No),
            "NO_TIMEOUT" => Some(Vote::NoTimeout),
            _ => None,
        }
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Commit,
    Abort,
}

impl Decision {
    /// Pure decision rule: commit only when every vote is YES.
    pub fn from_votes<'a, I>(votes: I) -> Decision
    where
        I: IntoIterator<Item = &'a Vote>,
    {
        if votes.into_iter().all(Vote::is_yes) {
            Decision::Commit
        } else {
            Decision::Abort
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Commit => "COMMIT",
            Decision::Abort => "ABORT",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Participant-side transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantState {
    /// Voted YES, operation buffered but not applied.
    Ready,
    /// 3PC only: every peer voted YES, waiting for the final instruction.
    #[serde(rename = "PRECOMMIT")]
    PreCommit,
    Committed,
    Aborted,
}

impl ParticipantState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantState::Ready => "READY",
            ParticipantState::PreCommit => "PRECOMMIT",
            ParticipantState::Committed => "COMMITTED",
            ParticipantState::Aborted => "ABORTED",
        }
    }

    /// READY and PRECOMMIT: voted, no decision received yet.
    pub fn is_in_doubt(&self) -> bool {
        matches!(self, ParticipantState::Ready | ParticipantState::PreCommit)
    }
}

impl fmt::Display for ParticipantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator-side transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorState {
    PrepareSent,
    CommitSent,
    AbortSent,
    CanCommitSent,
    #[serde(rename = "PRECOMMIT_SENT")]
    PreCommitSent,
    #[serde(rename = "DOCOMMIT_SENT")]
    DoCommitSent,
    Done,
}

/// Delivery progress of a decision notification to one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Delivered,
    PendingRetry,
    GivenUp,
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
