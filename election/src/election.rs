//! Election parameters committed on-chain.

use ballotchain_crypto::codec::{put_str, put_u64};
use ballotchain_crypto::PublicKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid election parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElectionError {
    #[error("election id and name must be non-empty")]
    EmptyField,

    #[error("an election needs at least two candidates")]
    TooFewCandidates,

    #[error("duplicate candidate entry")]
    DuplicateCandidate,

    #[error("start_time must precede end_time")]
    BadWindow,

    #[error("end_time is already in the past")]
    AlreadyEnded,
}

/// A single choice on the ballot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
}

/// Election parameters; the public key encrypts every ballot cast for it.
///
/// Timestamps are integer seconds since the Unix epoch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Election {
    pub id: String,
    pub name: String,
    pub candidates: Vec<Candidate>,
    pub start_time: u64,
    pub end_time: u64,
    pub public_key: PublicKey,
}

impl Election {
    /// Size of the allowed vote set {0..k-1}.
    pub fn candidate_count(&self) -> u64 {
        self.candidates.len() as u64
    }

    /// Index of a candidate by display name.
    pub fn candidate_index(&self, name: &str) -> Option<u64> {
        self.candidates
            .iter()
            .position(|c| c.name == name)
            .map(|i| i as u64)
    }

    /// Whether ballots are accepted at `ts`.
    pub fn is_open_at(&self, ts: u64) -> bool {
        ts >= self.start_time && ts <= self.end_time
    }

    /// Whether the voting window is over at `ts`.
    pub fn has_ended_by(&self, ts: u64) -> bool {
        ts > self.end_time
    }

    /// Structural invariants. `now` is the admission clock: wall time when a
    /// CreateElection first arrives, the transaction timestamp on replay.
    pub fn validate(&self, now: u64) -> Result<(), ElectionError> {
        if self.id.is_empty() || self.name.is_empty() {
            return Err(ElectionError::EmptyField);
        }
        if self.candidates.len() < 2 {
            return Err(ElectionError::TooFewCandidates);
        }
        for (i, c) in self.candidates.iter().enumerate() {
            if c.id.is_empty() || c.name.is_empty() {
                return Err(ElectionError::EmptyField);
            }
            if self.candidates[..i].iter().any(|p| p.id == c.id || p.name == c.name) {
                return Err(ElectionError::DuplicateCandidate);
            }
        }
        if self.start_time >= self.end_time {
            return Err(ElectionError::BadWindow);
        }
        if self.end_time <= now {
            return Err(ElectionError::AlreadyEnded);
        }
        Ok(())
    }

    /// Deterministic encoding used for transaction hashing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_str(&mut out, &self.id);
        put_str(&mut out, &self.name);
        put_u64(&mut out, self.candidates.len() as u64);
        for c in &self.candidates {
            put_str(&mut out, &c.id);
            put_str(&mut out, &c.name);
        }
        put_u64(&mut out, self.start_time);
        put_u64(&mut out, self.end_time);
        out.extend_from_slice(&self.public_key.to_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotchain_crypto::KeyPair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn sample(start: u64, end: u64) -> Election {
        let mut rng = ChaCha20Rng::seed_from_u64(50);
        let keys = KeyPair::generate(&mut rng);
        Election {
            id: "e1".into(),
            name: "Board".into(),
            candidates: vec![
                Candidate { id: "candidate-1".into(), name: "A".into() },
                Candidate { id: "candidate-2".into(), name: "B".into() },
            ],
            start_time: start,
            end_time: end,
            public_key: *keys.public_key(),
        }
    }

    #[test]
    fn valid_election_passes() {
        assert!(sample(100, 200).validate(150).is_ok());
    }

    #[test]
    fn needs_two_candidates() {
        let mut e = sample(100, 200);
        e.candidates.truncate(1);
        assert_eq!(e.validate(150), Err(ElectionError::TooFewCandidates));
    }

    #[test]
    fn rejects_inverted_window() {
        let e = sample(200, 100);
        assert_eq!(e.validate(50), Err(ElectionError::BadWindow));
    }

    #[test]
    fn rejects_already_ended() {
        let e = sample(100, 200);
        assert_eq!(e.validate(300), Err(ElectionError::AlreadyEnded));
    }

    #[test]
    fn rejects_duplicate_candidates() {
        let mut e = sample(100, 200);
        e.candidates[1].name = e.candidates[0].name.clone();
        assert_eq!(e.validate(150), Err(ElectionError::DuplicateCandidate));
    }

    #[test]
    fn window_predicates() {
        let e = sample(100, 200);
        assert!(!e.is_open_at(99));
        assert!(e.is_open_at(100));
        assert!(e.is_open_at(200));
        assert!(!e.is_open_at(201));
        assert!(!e.has_ended_by(200));
        assert!(e.has_ended_by(201));
    }

    #[test]
    fn candidate_lookup() {
        let e = sample(100, 200);
        assert_eq!(e.candidate_index("A"), Some(0));
        assert_eq!(e.candidate_index("B"), Some(1));
        assert_eq!(e.candidate_index("C"), None);
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let e = sample(100, 200);
        assert_eq!(e.canonical_bytes(), e.clone().canonical_bytes());
        let mut other = e.clone();
        other.end_time += 1;
        assert_ne!(e.canonical_bytes(), other.canonical_bytes());
    }

    #[test]
    fn serde_roundtrip() {
        let e = sample(100, 200);
        let json = serde_json::to_string(&e).unwrap();
        let back: Election = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
