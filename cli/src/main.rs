//! Election ledger CLI
//!
//! # Usage
//!
//! ```bash
//! # Start a node
//! ballotchain node --port 5000
//!
//! # Start a validator node with a bootstrap peer
//! ballotchain node --port 5001 --validator --peer localhost:5000
//!
//! # Create an election
//! ballotchain create-election --name "Board 2026" --candidates Alice,Bob \
//!     --start "2026-09-01 08:00" --end "2026-09-01 20:00" --node localhost:5000
//!
//! # Cast a vote
//! ballotchain vote --election election-1a2b3c --candidate Alice --node localhost:5000
//! ```

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{CreateElectionCommand, NodeCommand, VoteCommand};

/// Verifiable election ledger
#[derive(Parser)]
#[command(name = "ballotchain")]
#[command(version)]
#[command(about = "Permissioned election ledger node and voting tools", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a ledger node
    Node(NodeCommand),

    /// Create an election and submit it to a node
    CreateElection(CreateElectionCommand),

    /// Encrypt a ballot and submit it to a node
    Vote(VoteCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    logging::init(&cli.log_level);

    let outcome = match cli.command {
        Commands::Node(cmd) => cmd.execute().await,
        Commands::CreateElection(cmd) => cmd.execute().await,
        Commands::Vote(cmd) => cmd.execute().await,
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
