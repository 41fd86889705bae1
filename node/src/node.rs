//! The node state machine.
//!
//! All derived state (chain, pool, peer table, election index) lives behind
//! one reader-writer lock. Mutating operations take the write lock, queries
//! the read lock, and the lock is never held across network I/O: callers
//! copy what they need and release before sending.

use std::collections::HashMap;
use std::time::Duration;

use ballotchain_crypto::{derive_address, KeyPair, PublicKey};
use ballotchain_election::Election;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::block::{Block, ValidatorSet};
use crate::chain::Chain;
use crate::error::{NodeError, NodeResult, ValidationError};
use crate::index::ElectionIndex;
use crate::pool::TxPool;
use crate::transaction::{now_unix, Digest, Transaction};

/// Node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Run as a block-proposing validator
    pub is_validator: bool,
    /// Pool size that schedules a block proposal
    pub proposal_threshold: usize,
    /// Maximum transactions drained into one block
    pub block_capacity: usize,
    /// Blocks on top before a commitment counts as confirmed
    pub confirmation_depth: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            is_validator: false,
            proposal_threshold: 5,
            block_capacity: 100,
            confirmation_depth: 1,
        }
    }
}

impl NodeConfig {
    pub fn validator() -> Self {
        Self {
            is_validator: true,
            ..Default::default()
        }
    }
}

/// Liveness bookkeeping for one peer.
#[derive(Debug, Clone, Default)]
pub struct PeerInfo {
    pub failures: u32,
    pub last_attempt: u64,
    pub last_success: u64,
}

/// Observable state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Unknown,
    /// In the pool; not durable until its block is deep enough.
    Pending,
    Committed {
        confirmations: u64,
    },
}

struct NodeState {
    chain: Chain,
    pool: TxPool,
    peers: HashMap<String, PeerInfo>,
    index: ElectionIndex,
}

/// A single participant in the election network.
pub struct Node {
    state: RwLock<NodeState>,
    keypair: KeyPair,
    address: String,
    validators: ValidatorSet,
    config: NodeConfig,
    propose: Notify,
}

impl Node {
    /// Start from a fresh chain.
    pub fn new(keypair: KeyPair, validators: ValidatorSet, config: NodeConfig) -> NodeResult<Self> {
        Self::with_chain(keypair, validators, config, Chain::new())
    }

    /// Restore from an existing chain. A chain that fails full validation
    /// is a fatal startup error: the node must halt rather than serve it.
    pub fn with_chain(
        keypair: KeyPair,
        validators: ValidatorSet,
        config: NodeConfig,
        chain: Chain,
    ) -> NodeResult<Self> {
        let address = derive_address(keypair.public_key());
        if config.is_validator && !validators.contains(&address) {
            return Err(NodeError::Fatal(
                "validator key is not in the permitted set".into(),
            ));
        }

        let index = chain
            .validate_full(&validators)
            .map_err(|e| NodeError::Fatal(format!("chain failed validation: {e}")))?;

        Ok(Self {
            state: RwLock::new(NodeState {
                chain,
                pool: TxPool::new(),
                peers: HashMap::new(),
                index,
            }),
            address,
            keypair,
            validators,
            config,
            propose: Notify::new(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        self.keypair.public_key()
    }

    pub fn is_validator(&self) -> bool {
        self.config.is_validator
    }

    /// Wakes the proposer task. Multiple triggers while a proposal is in
    /// flight coalesce into one.
    pub fn proposal_trigger(&self) -> &Notify {
        &self.propose
    }

    /// Validate and pool a transaction. Schedules a block proposal when a
    /// validator's pool crosses the threshold.
    pub fn submit_transaction(&self, tx: Transaction) -> NodeResult<()> {
        tx.validate(now_unix())?;

        let should_propose = {
            let mut st = self.state.write();
            if st.pool.contains(&tx.hash) {
                return Err(NodeError::DuplicateInPool);
            }
            if st.index.is_committed(&tx.hash) {
                return Err(NodeError::DuplicateCommitted);
            }
            st.index.check(&tx)?;
            // Double votes are also blocked while the first is still pending.
            if let crate::transaction::Payload::CastVote(vote) = &tx.payload {
                if st.pool.has_voter(&vote.election_id, &vote.ballot.voter_id) {
                    return Err(NodeError::Invalid(ValidationError::DuplicateVoter));
                }
            }

            debug!(tx = %tx.hash, kind = tx.payload.kind(), "transaction pooled");
            st.pool.insert(tx);
            self.config.is_validator && st.pool.len() >= self.config.proposal_threshold
        };

        if should_propose {
            self.propose.notify_one();
        }
        Ok(())
    }

    /// Drain the pool FIFO into a signed block and append it. Pool drain and
    /// chain append happen under one write lock, so they are observable as a
    /// single step. Returns the block for the caller to broadcast.
    pub fn propose_block(&self) -> NodeResult<Option<Block>> {
        if !self.config.is_validator {
            return Err(NodeError::NotValidator);
        }

        let mut st = self.state.write();
        if st.pool.is_empty() {
            return Ok(None);
        }

        // Re-check context: a chain replacement since admission may have
        // invalidated pooled transactions (e.g. a fork committed the voter).
        let batch = st.pool.take_batch(self.config.block_capacity);
        let mut staged = st.index.clone();
        let mut included = Vec::with_capacity(batch.len());
        let mut dropped = Vec::new();
        for tx in batch {
            let still_valid =
                tx.validate(tx.timestamp).is_ok() && staged.check(&tx).is_ok();
            if still_valid {
                staged.apply(&tx);
                included.push(tx);
            } else {
                warn!(tx = %tx.hash, "dropping stale transaction from pool");
                dropped.push(tx.hash);
            }
        }
        st.pool.evict(dropped.iter());
        if included.is_empty() {
            return Ok(None);
        }

        let hashes: Vec<Digest> = included.iter().map(|tx| tx.hash).collect();
        let block = Block::build(
            st.chain.tip(),
            included,
            &self.keypair,
            &mut rand::thread_rng(),
        );
        st.index = staged;
        st.chain.blocks.push(block.clone());
        st.pool.evict(hashes.iter());

        info!(
            height = block.index,
            hash = %block.hash,
            txs = block.transactions.len(),
            "proposed block"
        );
        Ok(Some(block))
    }

    /// Accept a block from a peer if it extends the local tip.
    ///
    /// A block whose parent is unknown or buried is a hint that this node
    /// fell behind; the caller should sync. The node never holds forks.
    pub fn submit_block(&self, block: Block) -> NodeResult<()> {
        let mut st = self.state.write();

        if st.chain.contains_block(&block.hash) {
            return Err(NodeError::AlreadyPresent);
        }
        if block.parent_hash != st.chain.tip().hash {
            return Err(NodeError::UnknownParent);
        }

        block.validate_header(st.chain.tip(), &self.validators)?;
        let staged = st.index.apply_block(&block)?;

        let hashes: Vec<Digest> = block.transactions.iter().map(|tx| tx.hash).collect();
        info!(height = block.index, hash = %block.hash, "appended block");
        st.index = staged;
        st.chain.blocks.push(block);
        st.pool.evict(hashes.iter());
        Ok(())
    }

    /// Longest-chain rule: adopt `candidate` iff it is strictly higher and
    /// fully valid. Equal heights keep the local chain.
    ///
    /// Returns whether the chain was replaced.
    pub fn replace_chain(&self, candidate: Chain) -> NodeResult<bool> {
        // Cheap height check first; full validation is expensive.
        if candidate.height() <= self.state.read().chain.height() {
            return Ok(false);
        }

        let candidate_index = candidate
            .validate_full(&self.validators)
            .map_err(NodeError::Invalid)?;

        let mut st = self.state.write();
        // The local chain may have grown while we validated.
        if candidate.height() <= st.chain.height() {
            return Ok(false);
        }

        info!(
            from = st.chain.height(),
            to = candidate.height(),
            "replacing chain"
        );
        st.chain = candidate;
        st.index = candidate_index;
        let state = &mut *st;
        state.pool.retain_uncommitted(&state.index);
        Ok(true)
    }

    pub fn height(&self) -> u64 {
        self.state.read().chain.height()
    }

    pub fn chain_snapshot(&self) -> Chain {
        self.state.read().chain.clone()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.state.read().pool.transactions()
    }

    pub fn pending_len(&self) -> usize {
        self.state.read().pool.len()
    }

    /// A committed election by id.
    pub fn election(&self, id: &str) -> Option<Election> {
        self.state.read().index.election(id).cloned()
    }

    /// Where a transaction currently stands. Pending is not durable: it
    /// only hardens once its block is `confirmation_depth` under the tip.
    pub fn tx_status(&self, hash: &Digest) -> TxStatus {
        let st = self.state.read();
        if st.pool.contains(hash) {
            return TxStatus::Pending;
        }
        match st.chain.find_transaction(hash) {
            Some((block_index, _)) => TxStatus::Committed {
                confirmations: st.chain.height() - block_index,
            },
            None => TxStatus::Unknown,
        }
    }

    /// Whether a committed transaction has reached the confirmation depth.
    pub fn is_confirmed(&self, hash: &Digest) -> bool {
        matches!(
            self.tx_status(hash),
            TxStatus::Committed { confirmations } if confirmations >= self.config.confirmation_depth
        )
    }

    // Peer table. Additions are idempotent; entries are never removed, only
    // rate-limited after failures.

    /// Insert a peer address; true if it was new.
    pub fn insert_peer(&self, addr: &str) -> bool {
        let mut st = self.state.write();
        if st.peers.contains_key(addr) {
            return false;
        }
        st.peers.insert(addr.to_string(), PeerInfo::default());
        info!(peer = addr, "added peer");
        true
    }

    pub fn peers(&self) -> Vec<String> {
        self.state.read().peers.keys().cloned().collect()
    }

    /// Record a sync attempt; false means the peer is in failure backoff
    /// and should be skipped this round.
    pub fn mark_peer_attempt(&self, addr: &str, backoff: Duration) -> bool {
        let now = now_unix();
        let mut st = self.state.write();
        let Some(info) = st.peers.get_mut(addr) else {
            return false;
        };
        if info.failures > 0 {
            let wait = backoff.as_secs().saturating_mul(info.failures.min(6) as u64);
            if now < info.last_attempt + wait {
                return false;
            }
        }
        info.last_attempt = now;
        true
    }

    pub fn record_peer_success(&self, addr: &str) {
        if let Some(info) = self.state.write().peers.get_mut(addr) {
            info.failures = 0;
            info.last_success = now_unix();
        }
    }

    pub fn record_peer_failure(&self, addr: &str) {
        if let Some(info) = self.state.write().peers.get_mut(addr) {
            info.failures = info.failures.saturating_add(1);
        }
    }
}
