// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Participant State Machine
//!
//! ```text
//! prepare / can_commit ──▶ READY ──precommit──▶ PRECOMMIT
//!         │                  │                      │
//!         │ (NO vote)        └──────commit──────────┴──▶ COMMITTED
//!         ▼
//!      ABORTED ◀──────────────── abort (from anywhere)
//! ```
//!
//! Every transition is appended to the WAL inside the registry critical
//! section and before the in-memory record changes. A failed append
//! leaves the record untouched and surfaces as a durability error.

pub mod recovery;
pub mod store;

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{validate_txid, CommitError, Result};
use crate::registry::{Registry, RegistryState};
use crate::types::{now_ms, Operation, ParticipantState, Vote};
use crate::wal::{LogAction, LogRecord, WalWriter};

pub use recovery::Replay;
pub use store::KvStore;

#[derive(Debug, Clone, Default)]
pub struct ParticipantConfig {
    pub node_id: String,
    /// No WAL means nothing is durable; only useful in tests.
    pub wal_path: Option<PathBuf>,
}

impl ParticipantConfig {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            wal_path: None,
        }
    }

    pub fn with_wal(mut self, path: impl Into<PathBuf>) -> Self {
        self.wal_path = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantRecord {
    pub txid: String,
    pub state: ParticipantState,
    /// Buffered operation, kept after the decision for inspection.
    pub op: Option<Operation>,
    pub updated_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteOutcome {
    pub vote: Vote,
    pub state: ParticipantState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantStatus {
    pub node_id: String,
    pub store: KvStore,
    pub transactions: Vec<ParticipantRecord>,
    pub wal: Option<PathBuf>,
}

/// State guarded together with the transaction map.
pub struct ParticipantLocal {
    store: KvStore,
    wal: Option<WalWriter>,
}

impl ParticipantLocal {
    fn log(&mut self, record: LogRecord) -> Result<()> {
        if let Some(wal) = self.wal.as_mut() {
            wal.append(&record)?;
        }
        Ok(())
    }
}

pub struct Participant {
    node_id: String,
    wal_path: Option<PathBuf>,
    registry: Registry<ParticipantRecord, ParticipantLocal>,
}

impl Participant {
    /// Replays the WAL (if configured) and opens it for appending.
    pub fn open(config: ParticipantConfig) -> Result<Self> {
        let (replay, wal) = match &config.wal_path {
            Some(path) => {
                let replay = Replay::from_path(path)?;
                (replay, Some(WalWriter::open(path)?))
            }
            None => (Replay::new(), None),
        };

        info!(
            "Participant {} ready: {} transactions, {} keys recovered",
            config.node_id,
            replay.transactions.len(),
            replay.store.len()
        );

        Ok(Self {
            node_id: config.node_id,
            wal_path: config.wal_path,
            registry: Registry::with_transactions(
                replay.transactions,
                ParticipantLocal {
                    store: replay.store,
                    wal,
                },
            ),
        })
    }

    /// Participant without a log.
    pub fn in_memory(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            wal_path: None,
            registry: Registry::new(ParticipantLocal {
                store: KvStore::new(),
                wal: None,
            }),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// 2PC phase 1.
    pub fn prepare(&self, txid: &str, op: Option<Operation>) -> Result<VoteOutcome> {
        self.vote(txid, op, LogAction::Prepare)
    }

    /// 3PC phase 1.
    pub fn can_commit(&self, txid: &str, op: Option<Operation>) -> Result<VoteOutcome> {
        self.vote(txid, op, LogAction::CanCommit)
    }

    // A repeated vote for the same txid overwrites the earlier record.
    fn vote(&self, txid: &str, op: Option<Operation>, action: LogAction) -> Result<VoteOutcome> {
        let txid = validate_txid(txid)?;
        let valid = op.as_ref().and_then(Operation::command).is_some();
        let (vote, state) = if valid {
            (Vote::Yes, ParticipantState::Ready)
        } else {
            (Vote::No, ParticipantState::Aborted)
        };

        let mut guard = self.registry.lock();
        let RegistryState { transactions, shared } = &mut *guard;

        shared.log(LogRecord::new(&txid, action).with_vote(vote).with_op(op.clone()))?;
        transactions.insert(
            txid.clone(),
            ParticipantRecord {
                txid: txid.clone(),
                state,
                op,
                updated_at_ms: now_ms(),
            },
        );

        metrics::counter!("ratify_votes_total", 1, "vote" => vote.as_str());
        info!("{} {} {} -> vote {} state {}", self.node_id, action, txid, vote, state);
        Ok(VoteOutcome { vote, state })
    }

    /// 3PC phase 2: READY -> PRECOMMIT.
    pub fn precommit(&self, txid: &str) -> Result<ParticipantState> {
        let txid = validate_txid(txid)?;
        let mut guard = self.registry.lock();
        let RegistryState { transactions, shared } = &mut *guard;

        let record = match transactions.get_mut(&txid) {
            Some(record) if record.state == ParticipantState::Ready => record,
            other => {
                return Err(CommitError::PrecommitRequiresReady {
                    current: other.map(|r| r.state),
                })
            }
        };

        shared.log(LogRecord::new(&txid, LogAction::PreCommit).with_op(record.op.clone()))?;
        record.state = ParticipantState::PreCommit;
        record.updated_at_ms = now_ms();

        info!("{} PRECOMMIT {}", self.node_id, txid);
        Ok(record.state)
    }

    /// Applies the buffered operation. Allowed from READY (2PC) and
    /// PRECOMMIT (3PC) only, so an operation is never applied twice.
    pub fn commit(&self, txid: &str) -> Result<ParticipantState> {
        let txid = validate_txid(txid)?;
        let mut guard = self.registry.lock();
        let RegistryState { transactions, shared } = &mut *guard;

        let record = transactions.get_mut(&txid).ok_or(CommitError::UnknownTransaction)?;
        if !record.state.is_in_doubt() {
            return Err(CommitError::IllegalTransition { from: record.state });
        }
        let command = record
            .op
            .as_ref()
            .and_then(Operation::command)
            .ok_or_else(|| CommitError::MissingOperation(txid.clone()))?;

        shared.log(LogRecord::new(&txid, LogAction::Commit))?;
        shared.store.apply(&command);
        record.state = ParticipantState::Committed;
        record.updated_at_ms = now_ms();

        info!("{} COMMIT {} ({})", self.node_id, txid, command.key());
        Ok(record.state)
    }

    /// Always succeeds unless the log write fails. Creates an ABORTED
    /// record for a txid never seen before.
    pub fn abort(&self, txid: &str) -> Result<ParticipantState> {
        let txid = validate_txid(txid)?;
        let mut guard = self.registry.lock();
        let RegistryState { transactions, shared } = &mut *guard;

        shared.log(LogRecord::new(&txid, LogAction::Abort))?;
        let now = now_ms();
        let record = transactions.entry(txid.clone()).or_insert_with(|| ParticipantRecord {
            txid: txid.clone(),
            state: ParticipantState::Aborted,
            op: None,
            updated_at_ms: now,
        });
        if record.state == ParticipantState::Committed {
            debug!("{} abort {} after commit; store is not reverted", self.node_id, txid);
        }
        record.state = ParticipantState::Aborted;
        record.updated_at_ms = now;

        info!("{} ABORT {}", self.node_id, txid);
        Ok(record.state)
    }

    pub fn state_of(&self, txid: &str) -> Option<ParticipantState> {
        self.registry.get(txid).map(|r| r.state)
    }

    pub fn record(&self, txid: &str) -> Option<ParticipantRecord> {
        self.registry.get(txid)
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.registry.lock().shared.store.get(key).map(str::to_string)
    }

    pub fn store(&self) -> KvStore {
        self.registry.lock().shared.store.clone()
    }

    pub fn status(&self) -> ParticipantStatus {
        let guard = self.registry.lock();
        ParticipantStatus {
            node_id: self.node_id.clone(),
            store: guard.shared.store.clone(),
            transactions: guard.transactions.values().cloned().collect(),
            wal: self.wal_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(key: &str, value: &str) -> Option<Operation> {
        Some(Operation::set(key, value))
    }

    #[test]
    fn test_prepare_valid_votes_yes() {
        let p = Participant::in_memory("p1");
        let outcome = p.prepare("TX1", set("x", "5")).unwrap();
        assert_eq!(outcome, VoteOutcome { vote: Vote::Yes, state: ParticipantState::Ready });
        assert_eq!(p.value("x"), None);
    }

    #[test]
    fn test_prepare_invalid_votes_no() {
        let p = Participant::in_memory("p1");
        let bad = Operation::from_value(json!({"type": "DEL", "key": "x"}));
        assert_eq!(p.prepare("TX1", bad).unwrap().vote, Vote::No);
        assert_eq!(p.state_of("TX1"), Some(ParticipantState::Aborted));

        assert_eq!(p.can_commit("TX2", None).unwrap().vote, Vote::No);
    }

    #[test]
    fn test_repeated_prepare_overwrites() {
        let p = Participant::in_memory("p1");
        p.prepare("TX1", None).unwrap();
        assert_eq!(p.state_of("TX1"), Some(ParticipantState::Aborted));
        p.prepare("TX1", set("x", "1")).unwrap();
        assert_eq!(p.state_of("TX1"), Some(ParticipantState::Ready));
    }

    #[test]
    fn test_commit_applies_once() {
        let p = Participant::in_memory("p1");
        p.prepare("TX1", set("x", "5")).unwrap();
        assert_eq!(p.commit("TX1").unwrap(), ParticipantState::Committed);
        assert_eq!(p.value("x").as_deref(), Some("5"));

        let err = p.commit("TX1").unwrap_err();
        assert!(matches!(err, CommitError::IllegalTransition { from: ParticipantState::Committed }));
    }

    #[test]
    fn test_commit_unknown_txid() {
        let p = Participant::in_memory("p1");
        let err = p.commit("TX1").unwrap_err();
        assert_eq!(err.to_string(), "unknown txid");
        assert!(p.store().is_empty());
    }

    #[test]
    fn test_commit_from_aborted_rejected() {
        let p = Participant::in_memory("p1");
        p.abort("TX1").unwrap();
        let err = p.commit("TX1").unwrap_err();
        assert_eq!(err.to_string(), "cannot commit from state=ABORTED");
    }

    #[test]
    fn test_precommit_requires_ready() {
        let p = Participant::in_memory("p1");
        assert!(matches!(p.precommit("TX1"), Err(CommitError::PrecommitRequiresReady { current: None })));

        p.can_commit("TX1", set("x", "1")).unwrap();
        assert_eq!(p.precommit("TX1").unwrap(), ParticipantState::PreCommit);
        assert!(matches!(
            p.precommit("TX1"),
            Err(CommitError::PrecommitRequiresReady { current: Some(ParticipantState::PreCommit) })
        ));
        assert_eq!(p.state_of("TX1"), Some(ParticipantState::PreCommit));

        assert_eq!(p.commit("TX1").unwrap(), ParticipantState::Committed);
    }

    #[test]
    fn test_abort_is_idempotent() {
        let p = Participant::in_memory("p1");
        assert_eq!(p.abort("never-seen").unwrap(), ParticipantState::Aborted);
        assert_eq!(p.abort("never-seen").unwrap(), ParticipantState::Aborted);

        p.prepare("TX1", set("x", "5")).unwrap();
        p.abort("TX1").unwrap();
        assert_eq!(p.state_of("TX1"), Some(ParticipantState::Aborted));
        assert_eq!(p.value("x"), None);
    }

    #[test]
    fn test_blank_txid_rejected() {
        let p = Participant::in_memory("p1");
        assert!(matches!(p.prepare("  ", set("x", "5")), Err(CommitError::Validation(_))));
        assert!(matches!(p.abort(""), Err(CommitError::Validation(_))));
    }

    #[test]
    fn test_status_snapshot() {
        let p = Participant::in_memory("p1");
        p.prepare("TX1", set("x", "5")).unwrap();
        p.commit("TX1").unwrap();
        p.abort("TX2").unwrap();

        let status = p.status();
        assert_eq!(status.node_id, "p1");
        assert_eq!(status.transactions.len(), 2);
        assert_eq!(status.store.get("x"), Some("5"));
        assert!(status.wal.is_none());
    }
}
