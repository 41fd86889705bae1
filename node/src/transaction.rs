//! Transaction envelope and validation pipeline.

use std::time::{SystemTime, UNIX_EPOCH};

use ballotchain_crypto::codec::{put_str, put_u64};
use ballotchain_crypto::{sign, verify, KeyPair, PublicKey, Signature, VoterId};
use ballotchain_election::{Ballot, Election, TallyPayload};
use rand::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::ValidationError;

const TX_HASH_DOMAIN: &str = "ballotchain.tx.v1";

/// 32-byte blake3 digest, hex on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| de::Error::custom("digest must be 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// A vote for a committed election.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CastVote {
    pub election_id: String,
    pub ballot: Ballot,
}

impl CastVote {
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_str(&mut out, &self.election_id);
        out.extend_from_slice(&self.ballot.canonical_bytes());
        out
    }
}

/// Kind-specific transaction content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Payload {
    CreateElection(Election),
    CastVote(CastVote),
    TallyVotes(TallyPayload),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::CreateElection(_) => "create_election",
            Payload::CastVote(_) => "cast_vote",
            Payload::TallyVotes(_) => "tally_votes",
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Payload::CreateElection(_) => 1,
            Payload::CastVote(_) => 2,
            Payload::TallyVotes(_) => 3,
        }
    }

    fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.tag()];
        match self {
            Payload::CreateElection(e) => out.extend_from_slice(&e.canonical_bytes()),
            Payload::CastVote(v) => out.extend_from_slice(&v.canonical_bytes()),
            Payload::TallyVotes(t) => out.extend_from_slice(&t.canonical_bytes()),
        }
        out
    }
}

/// Signed envelope ordered into blocks. Immutable once committed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    #[serde(flatten)]
    pub payload: Payload,
    pub timestamp: u64,
    pub sender: PublicKey,
    pub hash: Digest,
    pub signature: Signature,
}

impl Transaction {
    /// Build, hash and sign a new transaction with the current wall clock.
    pub fn create<R: RngCore + CryptoRng>(
        payload: Payload,
        keypair: &KeyPair,
        rng: &mut R,
    ) -> Self {
        Self::create_at(payload, keypair, now_unix(), rng)
    }

    /// Build, hash and sign with an explicit timestamp.
    pub fn create_at<R: RngCore + CryptoRng>(
        payload: Payload,
        keypair: &KeyPair,
        timestamp: u64,
        rng: &mut R,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        let sender = *keypair.public_key();
        let hash = hash_parts(&id, &payload, timestamp, &sender);
        let signature = sign(keypair, hash.as_bytes(), rng);
        Self {
            id,
            payload,
            timestamp,
            sender,
            hash,
            signature,
        }
    }

    /// Canonical bytes: every field except hash and signature.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_parts(&self.id, &self.payload, self.timestamp, &self.sender)
    }

    pub fn compute_hash(&self) -> Digest {
        hash_parts(&self.id, &self.payload, self.timestamp, &self.sender)
    }

    /// Context-free validation pipeline: structural, hash integrity,
    /// signature, then the kind-specific rules that need no chain state.
    ///
    /// `now` is the admission clock: wall time when a transaction first
    /// arrives, its own timestamp when a block or chain is replayed.
    pub fn validate(&self, now: u64) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::Malformed("empty transaction id".into()));
        }
        if self.timestamp == 0 {
            return Err(ValidationError::Malformed("zero timestamp".into()));
        }

        if self.compute_hash() != self.hash {
            return Err(ValidationError::BadHash);
        }
        verify(&self.sender, self.hash.as_bytes(), &self.signature)
            .map_err(|_| ValidationError::BadSignature)?;

        match &self.payload {
            Payload::CreateElection(election) => {
                election.validate(now)?;
            }
            Payload::CastVote(vote) => {
                if vote.election_id.is_empty() {
                    return Err(ValidationError::Malformed("empty election id".into()));
                }
                if vote.ballot.proof.is_empty() {
                    return Err(ValidationError::Malformed("empty ballot proof".into()));
                }
                // The ballot must come from the key that signed the envelope.
                if vote.ballot.voter_id != VoterId::from_public_key(&self.sender) {
                    return Err(ValidationError::VoterMismatch);
                }
            }
            Payload::TallyVotes(tally) => {
                if tally.election_id.is_empty() {
                    return Err(ValidationError::Malformed("empty election id".into()));
                }
                if tally.counts.is_empty() {
                    return Err(ValidationError::Malformed("empty tally counts".into()));
                }
                if tally.proof.is_empty() {
                    return Err(ValidationError::Malformed("empty tally proof".into()));
                }
            }
        }
        Ok(())
    }
}

fn canonical_parts(id: &str, payload: &Payload, timestamp: u64, sender: &PublicKey) -> Vec<u8> {
    let mut out = Vec::new();
    put_str(&mut out, id);
    out.extend_from_slice(&payload.canonical_bytes());
    put_u64(&mut out, timestamp);
    out.extend_from_slice(&sender.to_bytes());
    out
}

fn hash_parts(id: &str, payload: &Payload, timestamp: u64, sender: &PublicKey) -> Digest {
    let mut hasher = blake3::Hasher::new_derive_key(TX_HASH_DOMAIN);
    hasher.update(&canonical_parts(id, payload, timestamp, sender));
    Digest(*hasher.finalize().as_bytes())
}

pub(crate) fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
