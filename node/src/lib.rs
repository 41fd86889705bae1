//! Ledger types and the node state machine.
//!
//! A node owns one chain, one pending-transaction pool and one peer table,
//! all behind a single reader-writer lock. Validators additionally assemble
//! and sign blocks once the pool crosses the proposal threshold.
//!
//! # Transaction Pipeline
//!
//! 1. **Admission**: structural, hash and signature checks, then the
//!    kind-specific rules against the committed chain
//! 2. **Pooling**: deduplicated, insertion-ordered pending set
//! 3. **Assembly**: a validator drains the pool FIFO into a signed block
//! 4. **Replication**: peers verify and append, or fall back to chain sync
//! 5. **Fork resolution**: longest validated chain wins, ties keep local

pub mod block;
pub mod chain;
pub mod error;
pub mod index;
pub mod node;
pub mod pool;
pub mod transaction;

pub use block::{Block, ValidatorSet};
pub use chain::Chain;
pub use error::{NodeError, NodeResult, ValidationError};
pub use index::ElectionIndex;
pub use node::{Node, NodeConfig, PeerInfo, TxStatus};
pub use pool::{PoolInsert, TxPool};
pub use transaction::{CastVote, Digest, Payload, Transaction};
