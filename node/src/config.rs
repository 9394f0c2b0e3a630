// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use ratify_kernel::coordinator::{CoordinatorConfig, FanOut, RetryPolicy, DEFAULT_CALL_TIMEOUT};
use ratify_kernel::participant::ParticipantConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Participant,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub role: Role,
    pub node_id: String,
    pub bind_addr: SocketAddr,
    pub wal_path: Option<PathBuf>,
    /// Participant base URLs, coordinator only.
    pub participants: Vec<String>,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub fan_out: FanOut,
}

impl NodeConfig {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        let mut config = CoordinatorConfig::default()
            .with_node_id(self.node_id.clone())
            .with_call_timeout(self.call_timeout)
            .with_retry(self.retry.clone())
            .with_fan_out(self.fan_out);
        if let Some(path) = &self.wal_path {
            config = config.with_wal(path.clone());
        }
        config
    }

    pub fn participant_config(&self) -> ParticipantConfig {
        let config = ParticipantConfig::new(self.node_id.clone());
        match &self.wal_path {
            Some(path) => config.with_wal(path.clone()),
            None => config,
        }
    }
}

fn parse_bind(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let addr = format!("{}:{}", host, port).parse()?;
    Ok(addr)
}

/// Splits a comma list, dropping blanks. An address listed twice is an
/// error; trailing slashes do not make two addresses distinct.
pub fn parse_participants(list: &str) -> anyhow::Result<Vec<String>> {
    let mut participants: Vec<String> = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let url = entry.trim_end_matches('/');
        if participants.iter().any(|p| p == url) {
            anyhow::bail!("participant {} listed more than once", url);
        }
        participants.push(url.to_string());
    }
    Ok(participants)
}

#[derive(Debug, Clone, Args)]
pub struct CoordinatorArgs {
    #[arg(long, default_value = "COORD")]
    pub id: String,
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, default_value_t = 8000)]
    pub port: u16,
    /// Comma-separated participant base URLs (http://IP:PORT)
    #[arg(long)]
    pub participants: String,
    /// Decision log
    #[arg(long, default_value = "coordinator.wal")]
    pub wal: PathBuf,
    /// Per-call timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_CALL_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,
    /// Contact the participants of a phase concurrently
    #[arg(long)]
    pub concurrent: bool,
}

impl CoordinatorArgs {
    pub fn into_config(self) -> anyhow::Result<NodeConfig> {
        let participants = parse_participants(&self.participants)?;
        if participants.is_empty() {
            anyhow::bail!("--participants must name at least one participant");
        }
        let retry = RetryPolicy::from_env();
        retry.validate().map_err(anyhow::Error::msg)?;

        Ok(NodeConfig {
            role: Role::Coordinator,
            node_id: self.id,
            bind_addr: parse_bind(&self.host, self.port)?,
            wal_path: Some(self.wal),
            participants,
            call_timeout: Duration::from_millis(self.timeout_ms),
            retry,
            fan_out: if self.concurrent { FanOut::Concurrent } else { FanOut::Sequential },
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ParticipantArgs {
    #[arg(long)]
    pub id: String,
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, default_value_t = 8001)]
    pub port: u16,
    /// Optional WAL path (/tmp/participant_B.wal)
    #[arg(long)]
    pub wal: Option<PathBuf>,
}

impl ParticipantArgs {
    pub fn into_config(self) -> anyhow::Result<NodeConfig> {
        Ok(NodeConfig {
            role: Role::Participant,
            node_id: self.id,
            bind_addr: parse_bind(&self.host, self.port)?,
            wal_path: self.wal,
            participants: Vec::new(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
            fan_out: FanOut::default(),
        })
    }
}
