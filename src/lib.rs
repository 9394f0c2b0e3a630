// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! ratify-kernel: two- and three-phase atomic commit over a durable log.
//!
//! The kernel holds the protocol core and no transport. Nodes plug in a
//! [`client::ParticipantClient`] to reach their peers.

pub mod client;
pub mod coordinator;
pub mod error;
pub mod participant;
pub mod registry;
pub mod types;
pub mod wal;

pub use client::{LocalParticipant, ParticipantClient, RpcError, StateReply, VoteReply};
pub use coordinator::{Coordinator, CoordinatorConfig, FanOut, Outcome, RetryPolicy, TransactionRecord};
pub use error::CommitError;
pub use participant::{Participant, ParticipantConfig, ParticipantRecord};
pub use types::{CoordinatorState, Decision, DeliveryStatus, Operation, ParticipantState, Protocol, Vote};
