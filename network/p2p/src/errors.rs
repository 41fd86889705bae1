//! P2P errors

use thiserror::Error;

/// Failures talking to one peer. Transient unless `Rejected`.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Peer unreachable or timed out; retried on the next sync round
    #[error("peer {peer} unreachable: {message}")]
    Unreachable { peer: String, message: String },

    /// Peer answered with something that does not parse
    #[error("peer {peer} returned malformed data: {message}")]
    Malformed { peer: String, message: String },

    /// Peer refused the payload with an HTTP status
    #[error("peer {peer} rejected the payload ({status})")]
    Rejected { peer: String, status: u16 },
}

impl TransportError {
    /// Duplicates are success as far as gossip is concerned.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, TransportError::Rejected { status: 409, .. })
    }
}
