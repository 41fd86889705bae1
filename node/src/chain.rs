//! The replicated chain: genesis, append, full validation.

use serde::{Deserialize, Serialize};

use crate::block::{Block, ValidatorSet};
use crate::error::ValidationError;
use crate::index::ElectionIndex;
use crate::transaction::Digest;

/// Non-empty block sequence starting at the deterministic genesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub blocks: Vec<Block>,
}

impl Chain {
    /// A fresh chain holding only genesis.
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Height of the tip; genesis is height 0. A structurally empty chain
    /// (possible only from the wire, rejected by validation) counts as 0.
    pub fn height(&self) -> u64 {
        (self.blocks.len() as u64).saturating_sub(1)
    }

    pub fn tip(&self) -> &Block {
        // A chain is never empty; it is built from genesis.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    pub fn contains_block(&self, hash: &Digest) -> bool {
        self.blocks.iter().any(|b| b.hash == *hash)
    }

    /// Validate `block` against the tip and append it. Transaction context
    /// is the caller's concern; the node stages it through the election
    /// index before calling.
    pub fn append(&mut self, block: Block, validators: &ValidatorSet) -> Result<(), ValidationError> {
        block.validate_header(self.tip(), validators)?;
        self.blocks.push(block);
        Ok(())
    }

    /// Locate a committed transaction: (block index, tx).
    pub fn find_transaction(&self, hash: &Digest) -> Option<(u64, &crate::Transaction)> {
        for block in &self.blocks {
            for tx in &block.transactions {
                if tx.hash == *hash {
                    return Some((block.index, tx));
                }
            }
        }
        None
    }

    /// Walk from genesis re-checking every invariant: genesis constants,
    /// header links and signatures, and every transaction in context with
    /// its own timestamp as the reference clock.
    ///
    /// Side-effect-free; returns the election index at the tip so callers
    /// can reuse the replayed state.
    pub fn validate_full(&self, validators: &ValidatorSet) -> Result<ElectionIndex, ValidationError> {
        let Some(genesis) = self.blocks.first() else {
            return Err(ValidationError::Malformed("empty chain".into()));
        };
        if *genesis != Block::genesis() {
            return Err(ValidationError::Malformed("non-canonical genesis".into()));
        }

        let mut index = ElectionIndex::new();
        for pair in self.blocks.windows(2) {
            pair[1].validate_header(&pair[0], validators)?;
            index = index.apply_block(&pair[1])?;
        }
        Ok(index)
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
