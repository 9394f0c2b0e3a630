use clap::{Parser, Subcommand};
use ratify_cli::commands::{inspect, start, status};

#[derive(Parser)]
#[command(name = "ratify")]
#[command(about = "Ratify CLI - drive and inspect 2PC/3PC commit clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a transaction that sets one key on every participant
    Start {
        /// Coordinator base URL
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        coordinator: String,

        #[arg(long)]
        txid: String,

        /// 2PC or 3PC
        #[arg(long, default_value = "2PC")]
        protocol: String,

        #[arg(long)]
        key: String,

        #[arg(long)]
        value: String,
    },
    /// Show the status of a coordinator or participant node
    Status {
        url: String,
    },
    /// Summarize a coordinator or participant WAL offline
    Inspect {
        wal_path: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            coordinator,
            txid,
            protocol,
            key,
            value,
        } => start::run(&coordinator, &txid, &protocol, &key, &value),
        Commands::Status { url } => status::run(&url),
        Commands::Inspect { wal_path } => inspect::run(&wal_path),
    }
}
