// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use ratify_node::config::{CoordinatorArgs, ParticipantArgs};
use ratify_node::telemetry::init_telemetry;

#[derive(Parser)]
#[command(name = "ratify-node")]
#[command(about = "Two- and three-phase commit node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the transaction coordinator
    Coordinator(CoordinatorArgs),
    /// Run a participant holding a key-value store
    Participant(ParticipantArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry()?;

    let config = match cli.command {
        Commands::Coordinator(args) => args.into_config()?,
        Commands::Participant(args) => args.into_config()?,
    };

    tracing::info!("Initializing ratify node with config: {:?}", config);
    ratify_node::run(config).await
}
