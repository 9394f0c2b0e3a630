// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Coordinator State Machine
//!
//! Drives every participant of a transaction through 2PC or 3PC to a
//! single decision.
//!
//! ```text
//! 2PC: PREPARE_SENT ──▶ COMMIT_SENT | ABORT_SENT ──▶ DONE
//! 3PC: CAN_COMMIT_SENT ──▶ ABORT_SENT ──────────────────────────▶ DONE
//!                     └──▶ PRECOMMIT_SENT ──▶ DOCOMMIT_SENT ──▶ DONE
//! ```
//!
//! Rules:
//! - Every participant is contacted in every phase, even after a NO.
//! - A failed or timed-out vote call counts as `NO_TIMEOUT`.
//! - The decision is logged before any participant hears it.
//! - Registry updates and log appends share one critical section; peer
//!   calls happen outside it.

pub mod record;
pub mod retry;

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::client::{ParticipantClient, RpcError, StateReply};
use crate::error::{validate_txid, CommitError, Result};
use crate::registry::{Registry, RegistryState};
use crate::types::{CoordinatorState, Decision, DeliveryStatus, Operation, ParticipantState, Protocol, Vote};
use crate::wal::{LogAction, LogRecord, WalWriter};

pub use record::{CoordinatorStatus, Outcome, TransactionRecord};
pub use retry::RetryPolicy;

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// How the participants of one phase are contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FanOut {
    /// One at a time, in list order.
    #[default]
    Sequential,
    /// All at once, joined before the phase concludes.
    Concurrent,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub node_id: String,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub fan_out: FanOut,
    pub wal_path: Option<PathBuf>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            node_id: "COORD".to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
            fan_out: FanOut::Sequential,
            wal_path: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fan_out(mut self, fan_out: FanOut) -> Self {
        self.fan_out = fan_out;
        self
    }

    pub fn with_wal(mut self, path: impl Into<PathBuf>) -> Self {
        self.wal_path = Some(path.into());
        self
    }
}

/// Decision notification sent in the final phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    PreCommit,
    Commit,
    Abort,
}

impl Notice {
    fn as_str(&self) -> &'static str {
        match self {
            Notice::PreCommit => "precommit",
            Notice::Commit => "commit",
            Notice::Abort => "abort",
        }
    }

    /// State a participant holds once this notice has been applied.
    fn target(&self) -> ParticipantState {
        match self {
            Notice::PreCommit => ParticipantState::PreCommit,
            Notice::Commit => ParticipantState::Committed,
            Notice::Abort => ParticipantState::Aborted,
        }
    }
}

impl From<Decision> for Notice {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Commit => Notice::Commit,
            Decision::Abort => Notice::Abort,
        }
    }
}

fn log(wal: &mut Option<WalWriter>, record: LogRecord) -> Result<()> {
    if let Some(wal) = wal.as_mut() {
        wal.append(&record)?;
    }
    Ok(())
}

pub struct Coordinator<C> {
    config: CoordinatorConfig,
    participants: Vec<C>,
    registry: Registry<TransactionRecord, Option<WalWriter>>,
}

impl<C: ParticipantClient> Coordinator<C> {
    pub fn new(config: CoordinatorConfig, participants: Vec<C>) -> Result<Self> {
        config.retry.validate().map_err(CommitError::Validation)?;
        let mut seen = BTreeSet::new();
        for client in &participants {
            if !seen.insert(client.address()) {
                return Err(CommitError::Validation(format!(
                    "participant {} listed more than once",
                    client.address()
                )));
            }
        }
        let wal = match &config.wal_path {
            Some(path) => Some(WalWriter::open(path)?),
            None => None,
        };

        info!(
            "Coordinator {} ready: participants={:?} fan_out={:?}",
            config.node_id,
            participants.iter().map(|p| p.address()).collect::<Vec<_>>(),
            config.fan_out
        );

        Ok(Self {
            config,
            participants,
            registry: Registry::new(wal),
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn participants(&self) -> Vec<String> {
        self.participants.iter().map(|p| p.address().to_string()).collect()
    }

    /// Runs one transaction to completion and returns the decision with
    /// the full vote map.
    ///
    /// Peer failures never fail the call; they show up as `NO_TIMEOUT`
    /// votes or delivery statuses. Errors are validation, duplicate
    /// txid, or a failed log write.
    pub async fn start(&self, txid: &str, protocol: Protocol, op: Option<Operation>) -> Result<Outcome> {
        let txid = validate_txid(txid)?;
        let op = op.ok_or_else(|| CommitError::Validation("txid and op required".to_string()))?;

        self.register(&txid, protocol, &op)?;
        info!("{} {} started", protocol, txid);

        let votes = self.collect_votes(&txid, protocol, &op).await;
        let decision = Decision::from_votes(votes.values());
        info!("{} {} votes={:?} decision={}", protocol, txid, votes, decision);

        match (protocol, decision) {
            (Protocol::TwoPhase, Decision::Commit) => {
                self.decide(&txid, decision, CoordinatorState::CommitSent)?;
                self.broadcast(&txid, Notice::Commit).await;
            }
            (_, Decision::Abort) => {
                self.decide(&txid, decision, CoordinatorState::AbortSent)?;
                self.broadcast(&txid, Notice::Abort).await;
            }
            (Protocol::ThreePhase, Decision::Commit) => {
                self.advance(&txid, CoordinatorState::PreCommitSent, Some(LogAction::PreCommit))?;
                self.broadcast(&txid, Notice::PreCommit).await;

                self.decide(&txid, decision, CoordinatorState::DoCommitSent)?;
                self.broadcast(&txid, Notice::Commit).await;
            }
        }

        self.advance(&txid, CoordinatorState::Done, Some(LogAction::Done))?;
        metrics::counter!(
            "ratify_transactions_total",
            1,
            "protocol" => protocol.as_str(),
            "decision" => decision.as_str()
        );
        info!("{} {} done: {}", protocol, txid, decision);

        Ok(Outcome {
            txid,
            protocol,
            decision,
            votes,
        })
    }

    pub fn transaction(&self, txid: &str) -> Option<TransactionRecord> {
        self.registry.get(txid)
    }

    pub fn status(&self) -> CoordinatorStatus {
        let mut transactions = self.registry.snapshot();
        transactions.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms).then_with(|| a.txid.cmp(&b.txid)));
        CoordinatorStatus {
            node_id: self.config.node_id.clone(),
            participants: self.participants(),
            transactions,
        }
    }

    // ---- registry transitions ----

    fn register(&self, txid: &str, protocol: Protocol, op: &Operation) -> Result<()> {
        let mut guard = self.registry.lock();
        let RegistryState { transactions, shared } = &mut *guard;

        if transactions.contains_key(txid) {
            return Err(CommitError::DuplicateTransaction(txid.to_string()));
        }
        let action = match protocol {
            Protocol::TwoPhase => LogAction::Prepare,
            Protocol::ThreePhase => LogAction::CanCommit,
        };
        log(shared, LogRecord::new(txid, action))?;
        transactions.insert(
            txid.to_string(),
            TransactionRecord::new(txid.to_string(), protocol, op.clone(), self.participants()),
        );
        Ok(())
    }

    fn decide(&self, txid: &str, decision: Decision, state: CoordinatorState) -> Result<()> {
        let mut guard = self.registry.lock();
        let RegistryState { transactions, shared } = &mut *guard;

        let record = transactions.get_mut(txid).ok_or(CommitError::UnknownTransaction)?;
        if record.decision.is_some() {
            return Err(CommitError::AlreadyDecided(txid.to_string()));
        }
        let action = match decision {
            Decision::Commit => LogAction::Commit,
            Decision::Abort => LogAction::Abort,
        };
        log(shared, LogRecord::new(txid, action))?;
        record.decide(decision);
        record.state = state;
        Ok(())
    }

    fn advance(&self, txid: &str, state: CoordinatorState, action: Option<LogAction>) -> Result<()> {
        let mut guard = self.registry.lock();
        let RegistryState { transactions, shared } = &mut *guard;

        let record = transactions.get_mut(txid).ok_or(CommitError::UnknownTransaction)?;
        if let Some(action) = action {
            log(shared, LogRecord::new(txid, action))?;
        }
        record.state = state;
        Ok(())
    }

    fn record_vote(&self, txid: &str, address: &str, vote: Vote) {
        if let Some(record) = self.registry.lock().transactions.get_mut(txid) {
            record.votes.insert(address.to_string(), vote);
        }
    }

    fn set_delivery(&self, txid: &str, address: &str, status: DeliveryStatus) {
        if let Some(record) = self.registry.lock().transactions.get_mut(txid) {
            record.deliveries.insert(address.to_string(), status);
        }
    }

    // ---- peer calls ----

    async fn fan_out<'a, F, Fut, T>(&'a self, call: F) -> Vec<T>
    where
        F: Fn(&'a C) -> Fut,
        Fut: Future<Output = T>,
    {
        match self.config.fan_out {
            FanOut::Sequential => {
                let mut results = Vec::with_capacity(self.participants.len());
                for client in &self.participants {
                    results.push(call(client).await);
                }
                results
            }
            FanOut::Concurrent => join_all(self.participants.iter().map(call)).await,
        }
    }

    async fn collect_votes(&self, txid: &str, protocol: Protocol, op: &Operation) -> BTreeMap<String, Vote> {
        let votes = self
            .fan_out(|client| async move {
                let vote = self.ask_vote(client, txid, protocol, op).await;
                self.record_vote(txid, client.address(), vote);
                (client.address().to_string(), vote)
            })
            .await;
        votes.into_iter().collect()
    }

    async fn ask_vote(&self, client: &C, txid: &str, protocol: Protocol, op: &Operation) -> Vote {
        let call = async {
            match protocol {
                Protocol::TwoPhase => client.prepare(txid, op).await,
                Protocol::ThreePhase => client.can_commit(txid, op).await,
            }
        };

        let vote = match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(Ok(reply)) => reply.vote,
            Ok(Err(e)) => {
                warn!("{} vote call to {} failed: {}", txid, client.address(), e);
                Vote::NoTimeout
            }
            Err(_) => {
                warn!("{} vote call to {} timed out after {:?}", txid, client.address(), self.config.call_timeout);
                Vote::NoTimeout
            }
        };
        metrics::counter!("ratify_votes_received_total", 1, "vote" => vote.as_str());
        vote
    }

    async fn broadcast(&self, txid: &str, notice: Notice) {
        self.fan_out(|client| async move {
            let status = self.deliver(client, txid, notice).await;
            self.set_delivery(txid, client.address(), status);
        })
        .await;
    }

    /// Delivers one notice with retry. Only transient failures are
    /// retried; a participant that answers with an error is given up on.
    /// A retry refused because the participant already holds the target
    /// state means an earlier attempt landed and only its reply was lost.
    async fn deliver(&self, client: &C, txid: &str, notice: Notice) -> DeliveryStatus {
        let policy = &self.config.retry;
        let attempts = policy.max_attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                self.set_delivery(txid, client.address(), DeliveryStatus::PendingRetry);
                metrics::counter!("ratify_delivery_retries_total", 1);
                tokio::time::sleep(policy.backoff(attempt - 1)).await;
            }

            match self.notify(client, txid, notice).await {
                Ok(reply) => {
                    debug!("{} {} delivered to {} (state {})", txid, notice.as_str(), client.address(), reply.state);
                    return DeliveryStatus::Delivered;
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "{} {} to {} failed (attempt {}/{}): {}",
                        txid,
                        notice.as_str(),
                        client.address(),
                        attempt + 1,
                        attempts,
                        e
                    );
                }
                Err(RpcError::Rejected { state: Some(state), .. }) if attempt > 0 && state == notice.target() => {
                    debug!(
                        "{} {} already applied at {} (state {})",
                        txid,
                        notice.as_str(),
                        client.address(),
                        state
                    );
                    return DeliveryStatus::Delivered;
                }
                Err(e) => {
                    warn!("{} {} rejected by {}: {}", txid, notice.as_str(), client.address(), e);
                    break;
                }
            }
        }

        metrics::counter!("ratify_delivery_given_up_total", 1);
        warn!("{} {} to {} given up", txid, notice.as_str(), client.address());
        DeliveryStatus::GivenUp
    }

    async fn notify(&self, client: &C, txid: &str, notice: Notice) -> std::result::Result<StateReply, RpcError> {
        let call = async {
            match notice {
                Notice::PreCommit => client.precommit(txid).await,
                Notice::Commit => client.commit(txid).await,
                Notice::Abort => client.abort(txid).await,
            }
        };
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout),
        }
    }
}
