//! Peer-to-peer gossip for the election ledger.
//!
//! The network layer fans transactions and blocks out to every known peer
//! and periodically reconciles chains: fetch a peer's chain, adopt it if it
//! is longer and valid, then merge the peer's own peer list. Transport is a
//! trait so tests can run whole networks in memory.

pub mod errors;
pub mod memory;
pub mod network;
pub mod transport;

pub use errors::TransportError;
pub use memory::MemoryTransport;
pub use network::{Network, P2pConfig};
pub use transport::{HttpTransport, Transport};
