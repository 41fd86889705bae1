//! Permissioned election ledger.
//!
//! Voters submit encrypted ballots with membership proofs; validator nodes
//! order them into a replicated append-only chain; an out-of-band trustee
//! publishes a proof-carrying tally. This crate wires the member crates
//! into a runnable full node.

pub mod node;

pub use node::{FullNode, FullNodeConfig, RuntimeError};

pub use ballotchain_crypto as crypto;
pub use ballotchain_election as election;
pub use ballotchain_node as ledger;
pub use ballotchain_p2p as p2p;
pub use ballotchain_rpc as rpc;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
