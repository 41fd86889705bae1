//! Node errors

use ballotchain_election::ElectionError;
use thiserror::Error;

use crate::transaction::Digest;

/// Node result type
pub type NodeResult<T> = Result<T, NodeError>;

/// Why a transaction, block or chain was rejected.
///
/// `kind()` splits the taxonomy for the boundary: malformed input is a parse
/// or structure problem, everything else is well-formed but semantically
/// invalid. Proof failures stay opaque and never name the failing branch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Structural problem in an otherwise parseable value
    #[error("{0}")]
    Malformed(String),

    /// Stored hash does not match recomputation
    #[error("stored hash does not match recomputation")]
    BadHash,

    /// Signature does not verify against the sender key
    #[error("signature verification failed")]
    BadSignature,

    /// Ballot proof rejected (no detail on purpose)
    #[error("ballot rejected")]
    BadProof,

    /// Tally proof rejected (no detail on purpose)
    #[error("tally rejected")]
    BadTally,

    /// Ballot voter id does not match the transaction sender
    #[error("ballot voter does not match the transaction sender")]
    VoterMismatch,

    /// Voter already cast a ballot in this election
    #[error("voter has already cast a ballot in this election")]
    DuplicateVoter,

    /// Transaction hash already committed in the chain being extended
    #[error("transaction {0} replayed from the committed chain")]
    Replayed(Digest),

    /// Vote references an election that is not committed
    #[error("unknown election {0}")]
    UnknownElection(String),

    /// CreateElection for an id that already exists
    #[error("election {0} already exists")]
    ElectionExists(String),

    /// Ballot timestamp outside the voting window
    #[error("election {0} is not open at the ballot timestamp")]
    ElectionClosed(String),

    /// Tally submitted before the voting window closed
    #[error("election {0} has not ended")]
    ElectionNotEnded(String),

    /// Election already has a committed tally
    #[error("election {0} has already been tallied")]
    AlreadyTallied(String),

    /// Invalid election parameters
    #[error("election: {0}")]
    Election(#[from] ElectionError),

    /// Block index does not follow its parent
    #[error("block index {got} does not follow parent index {parent}")]
    BadIndex { got: u64, parent: u64 },

    /// Block parent hash does not match the parent block
    #[error("block parent hash does not match the parent")]
    BadParentLink,

    /// Block timestamp not strictly after the parent's
    #[error("block timestamp must exceed the parent's")]
    BadTimestamp,

    /// Block signer outside the permitted validator set
    #[error("validator {0} is not in the permitted set")]
    UnknownValidator(String),

    /// Non-genesis block without a validator signature
    #[error("block carries no validator signature")]
    MissingSignature,
}

impl ValidationError {
    /// Machine-readable kind for wire error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Malformed(_) => "malformed",
            _ => "invalid",
        }
    }
}

/// Node operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Transaction already pending in the pool
    #[error("transaction already pending in the pool")]
    DuplicateInPool,

    /// Transaction already committed to the chain
    #[error("transaction already committed to the chain")]
    DuplicateCommitted,

    /// Block already present in the chain
    #[error("block already present in the chain")]
    AlreadyPresent,

    /// Block parent is not the local tip; caller should sync
    #[error("block parent is not the local tip")]
    UnknownParent,

    /// Operation requires a validator node
    #[error("node is not configured as a validator")]
    NotValidator,

    /// Validation failure
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Persisted state failed validation at startup; the node must halt
    #[error("fatal: {0}")]
    Fatal(String),
}

impl NodeError {
    /// Machine-readable kind for wire error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::DuplicateInPool | NodeError::DuplicateCommitted => "duplicate",
            NodeError::AlreadyPresent => "already_present",
            NodeError::UnknownParent => "unknown_parent",
            NodeError::NotValidator => "not_validator",
            NodeError::Invalid(e) => e.kind(),
            NodeError::Fatal(_) => "fatal",
        }
    }

    /// Whether gossip may treat the outcome as success.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            NodeError::DuplicateInPool | NodeError::DuplicateCommitted | NodeError::AlreadyPresent
        )
    }
}
