//! Block types and validation.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use ballotchain_crypto::codec::{put_str, put_u64};
use ballotchain_crypto::{sign, verify, KeyPair, PublicKey, Signature};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::transaction::{Digest, Transaction};

const BLOCK_HASH_DOMAIN: &str = "ballotchain.block.v1";
const MERKLE_DOMAIN: &str = "ballotchain.merkle.v1";

/// Permitted block signers, fixed by configuration at genesis.
#[derive(Clone, Debug, Default)]
pub struct ValidatorSet {
    keys: HashMap<String, PublicKey>,
}

impl ValidatorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator under its derived address.
    pub fn insert(&mut self, pk: PublicKey) {
        self.keys.insert(ballotchain_crypto::derive_address(&pk), pk);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.keys.contains_key(address)
    }

    pub fn key_of(&self, address: &str) -> Option<&PublicKey> {
        self.keys.get(address)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<PublicKey> for ValidatorSet {
    fn from_iter<T: IntoIterator<Item = PublicKey>>(iter: T) -> Self {
        let mut set = Self::new();
        for pk in iter {
            set.insert(pk);
        }
        set
    }
}

/// An ordered batch of transactions linked to its parent and signed by the
/// proposing validator. Genesis is the single unsigned block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub parent_hash: Digest,
    pub transactions: Vec<Transaction>,
    pub validator: String,
    pub nonce: u64,
    pub hash: Digest,
    pub signature: Option<Signature>,
}

impl Block {
    /// The deterministic genesis block; bit-identical on every node.
    pub fn genesis() -> Self {
        let mut block = Self {
            index: 0,
            timestamp: 0,
            parent_hash: Digest::zero(),
            transactions: Vec::new(),
            validator: String::new(),
            nonce: 0,
            hash: Digest::zero(),
            signature: None,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Assemble and sign a block extending `parent`.
    ///
    /// The timestamp is the wall clock, pushed forward if needed to stay
    /// strictly after the parent's.
    pub fn build<R: RngCore + CryptoRng>(
        parent: &Block,
        transactions: Vec<Transaction>,
        keypair: &KeyPair,
        rng: &mut R,
    ) -> Self {
        let timestamp = now_unix().max(parent.timestamp + 1);
        let mut block = Self {
            index: parent.index + 1,
            timestamp,
            parent_hash: parent.hash,
            transactions,
            validator: ballotchain_crypto::derive_address(keypair.public_key()),
            nonce: 0,
            hash: Digest::zero(),
            signature: None,
        };
        block.hash = block.compute_hash();
        block.signature = Some(sign(keypair, block.hash.as_bytes(), rng));
        block
    }

    /// Merkle root over the ordered transaction hashes.
    pub fn merkle_root(transactions: &[Transaction]) -> Digest {
        if transactions.is_empty() {
            return Digest::zero();
        }

        let mut leaves: Vec<[u8; 32]> = transactions.iter().map(|tx| *tx.hash.as_bytes()).collect();

        while leaves.len() > 1 {
            let mut next_level = Vec::with_capacity(leaves.len().div_ceil(2));
            for chunk in leaves.chunks(2) {
                let mut hasher = blake3::Hasher::new_derive_key(MERKLE_DOMAIN);
                hasher.update(&chunk[0]);
                // Odd leaf pairs with itself.
                hasher.update(if chunk.len() > 1 { &chunk[1] } else { &chunk[0] });
                next_level.push(*hasher.finalize().as_bytes());
            }
            leaves = next_level;
        }

        Digest::from_bytes(leaves[0])
    }

    /// Canonical header bytes: everything except hash and signature, with
    /// the transaction list committed through its merkle root.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u64(&mut out, self.index);
        put_u64(&mut out, self.timestamp);
        out.extend_from_slice(self.parent_hash.as_bytes());
        put_str(&mut out, &self.validator);
        put_u64(&mut out, self.nonce);
        out.extend_from_slice(Self::merkle_root(&self.transactions).as_bytes());
        out
    }

    pub fn compute_hash(&self) -> Digest {
        let mut hasher = blake3::Hasher::new_derive_key(BLOCK_HASH_DOMAIN);
        hasher.update(&self.canonical_bytes());
        Digest::from_bytes(*hasher.finalize().as_bytes())
    }

    /// Header-level predicates against the parent, in order; the first
    /// failure is reported. Transaction context checks run in the chain walk.
    pub fn validate_header(
        &self,
        parent: &Block,
        validators: &ValidatorSet,
    ) -> Result<(), ValidationError> {
        if self.index != parent.index + 1 {
            return Err(ValidationError::BadIndex {
                got: self.index,
                parent: parent.index,
            });
        }
        if self.parent_hash != parent.hash {
            return Err(ValidationError::BadParentLink);
        }
        if self.timestamp <= parent.timestamp {
            return Err(ValidationError::BadTimestamp);
        }
        if self.compute_hash() != self.hash {
            return Err(ValidationError::BadHash);
        }

        let signature = self
            .signature
            .as_ref()
            .ok_or(ValidationError::MissingSignature)?;
        let pk = validators
            .key_of(&self.validator)
            .ok_or_else(|| ValidationError::UnknownValidator(self.validator.clone()))?;
        verify(pk, self.hash.as_bytes(), signature).map_err(|_| ValidationError::BadSignature)?;

        Ok(())
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
