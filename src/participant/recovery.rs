// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Participant log replay.
//!
//! Runs once at startup, before the node serves requests. Later lines
//! for a txid overwrite earlier ones:
//!
//! | line                 | state     |
//! |----------------------|-----------|
//! | PREPARE / CAN_COMMIT | READY, or ABORTED when the vote was NO |
//! | PRECOMMIT            | PRECOMMIT |
//! | COMMIT               | COMMITTED, operation re-applied to the store |
//! | ABORT                | ABORTED   |
//!
//! The operation payload is carried forward from the vote line so a
//! recovered READY/PRECOMMIT transaction can still commit.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

use tracing::{info, warn};

use super::store::KvStore;
use super::ParticipantRecord;
use crate::types::{now_ms, ParticipantState, Vote};
use crate::wal::{LogAction, LogRecord, WalError, WalReader, WalResult};

/// Replay accumulator.
#[derive(Debug, Default)]
pub struct Replay {
    pub transactions: BTreeMap<String, ParticipantRecord>,
    pub store: KvStore,
    /// Lines folded into state.
    pub applied: usize,
    /// Malformed lines that were skipped.
    pub skipped: usize,
}

impl Replay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replays a participant log. A missing file yields an empty replay.
    pub fn from_path<P: AsRef<Path>>(path: P) -> WalResult<Self> {
        let path = path.as_ref();
        let start = Instant::now();
        let mut replay = Replay::new();

        let reader = match WalReader::open_if_exists(path)? {
            Some(reader) => reader,
            None => {
                info!("No WAL at {:?}, starting fresh", path);
                return Ok(replay);
            }
        };

        for entry in reader {
            match entry {
                Ok(record) => replay.apply(record),
                Err(WalError::Malformed { line, reason }) => {
                    warn!("Skipping malformed WAL line {} in {:?}: {}", line, path, reason);
                    replay.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let elapsed = start.elapsed();
        metrics::histogram!("ratify_replay_duration_seconds", elapsed.as_secs_f64());
        info!(
            "Replayed {} WAL lines from {:?} ({} skipped, {} transactions) in {:?}",
            replay.applied,
            path,
            replay.skipped,
            replay.transactions.len(),
            elapsed
        );
        Ok(replay)
    }

    /// Folds one log line into the reconstructed state.
    pub fn apply(&mut self, record: LogRecord) {
        let LogRecord { txid, action, vote, op } = record;

        let prior_op = self.transactions.get(&txid).and_then(|r| r.op.clone());
        let op = op.or(prior_op);

        let state = match action {
            LogAction::Prepare | LogAction::CanCommit => match vote {
                Some(Vote::No) | Some(Vote::NoTimeout) => ParticipantState::Aborted,
                _ => ParticipantState::Ready,
            },
            LogAction::PreCommit => ParticipantState::PreCommit,
            LogAction::Commit => {
                if let Some(command) = op.as_ref().and_then(|o| o.command()) {
                    self.store.apply(&command);
                } else {
                    warn!("COMMIT for {} has no replayable operation", txid);
                }
                ParticipantState::Committed
            }
            LogAction::Abort => ParticipantState::Aborted,
            LogAction::Done => return,
        };

        self.applied += 1;
        self.transactions.insert(
            txid.clone(),
            ParticipantRecord {
                txid,
                state,
                op,
                updated_at_ms: now_ms(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Operation;
    use std::fs;
    use tempfile::tempdir;

    fn line(txid: &str, action: LogAction) -> LogRecord {
        LogRecord::new(txid, action)
    }

    #[test]
    fn test_transition_table() {
        let mut replay = Replay::new();
        let op = Some(Operation::set("x", "5"));
        replay.apply(line("A", LogAction::Prepare).with_vote(Vote::Yes).with_op(op.clone()));
        replay.apply(line("B", LogAction::CanCommit).with_vote(Vote::Yes).with_op(op.clone()));
        replay.apply(line("B", LogAction::PreCommit).with_op(op.clone()));
        replay.apply(line("C", LogAction::Prepare).with_vote(Vote::Yes).with_op(op.clone()));
        replay.apply(line("C", LogAction::Commit));
        replay.apply(line("D", LogAction::Abort));
        replay.apply(line("E", LogAction::Prepare).with_vote(Vote::No));

        let state = |id: &str| replay.transactions[id].state;
        assert_eq!(state("A"), ParticipantState::Ready);
        assert_eq!(state("B"), ParticipantState::PreCommit);
        assert_eq!(state("C"), ParticipantState::Committed);
        assert_eq!(state("D"), ParticipantState::Aborted);
        assert_eq!(state("E"), ParticipantState::Aborted);
        assert_eq!(replay.store.get("x"), Some("5"));
    }

    #[test]
    fn test_payload_carried_forward() {
        let mut replay = Replay::new();
        replay.apply(line("T", LogAction::CanCommit).with_vote(Vote::Yes).with_op(Some(Operation::set("k", "v"))));
        replay.apply(line("T", LogAction::PreCommit));
        assert_eq!(replay.transactions["T"].op, Some(Operation::set("k", "v")));
    }

    #[test]
    fn test_done_is_ignored() {
        let mut replay = Replay::new();
        replay.apply(line("T", LogAction::Done));
        assert!(replay.transactions.is_empty());
        assert_eq!(replay.applied, 0);
    }

    #[test]
    fn test_abort_does_not_touch_store() {
        let mut replay = Replay::new();
        replay.apply(line("T", LogAction::Prepare).with_vote(Vote::Yes).with_op(Some(Operation::set("k", "v"))));
        replay.apply(line("T", LogAction::Abort));
        assert!(replay.store.is_empty());
    }

    #[test]
    fn test_missing_file_is_fresh_node() {
        let dir = tempdir().unwrap();
        let replay = Replay::from_path(dir.path().join("nope.wal")).unwrap();
        assert!(replay.transactions.is_empty());
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.wal");
        fs::write(&path, "TX1 PREPARE YES {\"type\":\"SET\",\"key\":\"a\",\"value\":\"1\"}\ngarbage\nTX1 COMMIT\nTX2 PREPARE YES {\"ty").unwrap();

        let replay = Replay::from_path(&path).unwrap();
        assert_eq!(replay.skipped, 2);
        assert_eq!(replay.transactions["TX1"].state, ParticipantState::Committed);
        assert!(!replay.transactions.contains_key("TX2"));
        assert_eq!(replay.store.get("a"), Some("1"));
    }
}
