//! Crypto errors

use thiserror::Error;

/// Crypto result type
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures from the cryptographic layer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// Bytes do not decode to a point of the prime-order subgroup
    #[error("malformed group element")]
    MalformedPoint,

    /// Bytes do not decode to a canonical scalar
    #[error("malformed scalar")]
    MalformedScalar,

    /// Signature did not verify
    #[error("signature verification failed")]
    BadSignature,

    /// Candidate index outside the allowed set
    #[error("candidate index outside the allowed set")]
    InvalidCandidate,

    /// Proof bytes do not decode
    #[error("malformed proof encoding")]
    MalformedProof,
}
