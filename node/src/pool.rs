//! Pending transaction pool.
//!
//! Hash-keyed for O(1) dedup, insertion-ordered so block assembly is
//! deterministic FIFO.

use ballotchain_crypto::VoterId;
use indexmap::IndexMap;

use crate::index::ElectionIndex;
use crate::transaction::{Digest, Payload, Transaction};

/// Outcome of a pool insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolInsert {
    Accepted,
    Duplicate,
}

/// Deduplicated pending set. Validation happens before insertion; the pool
/// itself only orders and dedups.
#[derive(Debug, Default)]
pub struct TxPool {
    pending: IndexMap<Digest, Transaction>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tx: Transaction) -> PoolInsert {
        if self.pending.contains_key(&tx.hash) {
            return PoolInsert::Duplicate;
        }
        self.pending.insert(tx.hash, tx);
        PoolInsert::Accepted
    }

    pub fn contains(&self, hash: &Digest) -> bool {
        self.pending.contains_key(hash)
    }

    /// Whether a pending CastVote already claims this voter for the
    /// election; blocks double votes before either one commits.
    pub fn has_voter(&self, election_id: &str, voter: &VoterId) -> bool {
        self.pending.values().any(|tx| match &tx.payload {
            Payload::CastVote(v) => {
                v.election_id == election_id && v.ballot.voter_id == *voter
            }
            _ => false,
        })
    }

    /// Up to `max` transactions in insertion order; the pool keeps them
    /// until `evict` confirms block acceptance.
    pub fn take_batch(&self, max: usize) -> Vec<Transaction> {
        self.pending.values().take(max).cloned().collect()
    }

    /// Remove transactions included in an accepted block.
    pub fn evict<'a>(&mut self, hashes: impl IntoIterator<Item = &'a Digest>) {
        for hash in hashes {
            self.pending.shift_remove(hash);
        }
    }

    /// Drop every pending transaction already committed in `index`; called
    /// after a chain replacement.
    pub fn retain_uncommitted(&mut self, index: &ElectionIndex) {
        self.pending.retain(|hash, _| !index.is_committed(hash));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshot of the pending set in insertion order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.pending.values().cloned().collect()
    }
}
