// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod api;
pub mod config;
pub mod errors;
pub mod network;
pub mod server;
pub mod telemetry;

use std::sync::Arc;

use ratify_kernel::{Coordinator, Participant};
use tokio::net::TcpListener;

use crate::config::{NodeConfig, Role};
use crate::network::HttpParticipant;
use crate::server::{build_coordinator_router, build_participant_router, HttpCoordinator};

/// Builds a coordinator whose participants are reached over HTTP.
pub fn build_coordinator(config: &NodeConfig) -> anyhow::Result<HttpCoordinator> {
    let client = HttpParticipant::build_client(config.call_timeout)?;
    let participants = config
        .participants
        .iter()
        .map(|url| HttpParticipant::new(url, client.clone()))
        .collect();
    Ok(Coordinator::new(config.coordinator_config(), participants)?)
}

/// Recovers (participant) or opens (coordinator) the node, then serves
/// until the listener fails.
pub async fn run(config: NodeConfig) -> anyhow::Result<()> {
    let app = match config.role {
        Role::Coordinator => build_coordinator_router(Arc::new(build_coordinator(&config)?)),
        Role::Participant => build_participant_router(Arc::new(Participant::open(config.participant_config())?)),
    };

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!(
        "[{}] {:?} listening on {} wal={:?}",
        config.node_id,
        config.role,
        config.bind_addr,
        config.wal_path
    );
    axum::serve(listener, app).await?;
    Ok(())
}
