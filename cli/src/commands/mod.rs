//! CLI subcommands.

mod election;
mod node;
mod vote;

pub use election::CreateElectionCommand;
pub use node::NodeCommand;
pub use vote::VoteCommand;

use thiserror::Error;

/// CLI failures, mapped onto process exit codes.
#[derive(Error, Debug)]
pub enum CliError {
    /// Bad arguments or local setup problem (exit 1)
    #[error("{0}")]
    Usage(String),

    /// Could not reach the node (exit 2)
    #[error("network error: {0}")]
    Network(String),

    /// The node rejected the request (exit 3)
    #[error("rejected by node: {0}")]
    Rejected(String),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage(_) => 1,
            CliError::Network(_) => 2,
            CliError::Rejected(_) => 3,
        }
    }
}

impl From<reqwest::Error> for CliError {
    fn from(e: reqwest::Error) -> Self {
        CliError::Network(e.to_string())
    }
}

/// Turn a non-success HTTP response into a rejection error with whatever
/// detail the node sent back.
pub(crate) async fn rejection(resp: reqwest::Response) -> CliError {
    let status = resp.status();
    let detail = resp.text().await.unwrap_or_default();
    if detail.is_empty() {
        CliError::Rejected(status.to_string())
    } else {
        CliError::Rejected(format!("{status}: {detail}"))
    }
}
