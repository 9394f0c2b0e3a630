// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const DEFAULT_LOG_FILTER: &str = "ratify_node=debug,ratify_kernel=info,tower_http=info";

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    let handle = PrometheusBuilder::new().install_recorder()?;

    // Store handle for /metrics endpoint
    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
    }

    metrics::describe_counter!("ratify_transactions_total", "Transactions run to completion, by protocol and decision");
    metrics::describe_counter!("ratify_votes_total", "Phase-1 votes cast by this participant, by vote");
    metrics::describe_counter!("ratify_votes_received_total", "Phase-1 votes collected by this coordinator, by vote");
    metrics::describe_counter!("ratify_delivery_retries_total", "Decision notifications retried");
    metrics::describe_counter!("ratify_delivery_given_up_total", "Decision notifications abandoned");
    metrics::describe_counter!("ratify_wal_appends_total", "Durable WAL appends");
    metrics::describe_histogram!("ratify_replay_duration_seconds", "Time taken to replay the participant WAL");

    metrics::gauge!("ratify_node_up", 1.0);
    Ok(())
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
