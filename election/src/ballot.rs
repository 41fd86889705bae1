//! Encrypted ballots.

use ballotchain_crypto::codec::put_bytes;
use ballotchain_crypto::{
    encrypt, prove_vote, verify_vote, Ciphertext, CryptoResult, KeyPair, PublicKey, VoterId,
};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::serde_hex;

/// An encrypted ballot: ciphertext, membership proof and voter identifier.
///
/// Carries no mutable state after construction; everything a validator
/// needs is re-derivable from the transcript bound to the election id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub ciphertext: Ciphertext,
    #[serde(with = "serde_hex")]
    pub proof: Vec<u8>,
    pub voter_id: VoterId,
}

impl Ballot {
    pub fn new(ciphertext: Ciphertext, proof: Vec<u8>, voter_id: VoterId) -> Self {
        Self {
            ciphertext,
            proof,
            voter_id,
        }
    }

    /// Encrypt `vote` under the election key and attach the validity proof.
    ///
    /// The encryption randomness lives only for the duration of this call.
    pub fn seal<R: RngCore + CryptoRng>(
        election_id: &str,
        election_pk: &PublicKey,
        vote: u64,
        candidate_count: u64,
        voter: &KeyPair,
        rng: &mut R,
    ) -> CryptoResult<Self> {
        let (ciphertext, r) = encrypt(election_pk, vote, rng);
        let proof = prove_vote(
            election_id,
            election_pk,
            &ciphertext,
            &r,
            vote,
            candidate_count,
            rng,
        )?;
        Ok(Self {
            ciphertext,
            proof: proof.to_bytes(),
            voter_id: VoterId::from_public_key(voter.public_key()),
        })
    }

    /// True iff the proof verifies for the ciphertext on the transcript
    /// bound to `election_id`.
    pub fn validate(
        &self,
        election_id: &str,
        election_pk: &PublicKey,
        candidate_count: u64,
    ) -> bool {
        if self.proof.is_empty() {
            return false;
        }
        verify_vote(
            election_id,
            election_pk,
            &self.ciphertext,
            candidate_count,
            &self.proof,
        )
    }

    /// Deterministic encoding used for transaction hashing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.ciphertext.to_bytes());
        put_bytes(&mut out, &self.proof);
        out.extend_from_slice(self.voter_id.as_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotchain_crypto::{CurvePoint, Scalar};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    const ELECTION: &str = "e1";

    fn setup() -> (ChaCha20Rng, KeyPair, KeyPair) {
        let mut rng = ChaCha20Rng::seed_from_u64(60);
        let election_keys = KeyPair::generate(&mut rng);
        let voter = KeyPair::generate(&mut rng);
        (rng, election_keys, voter)
    }

    #[test]
    fn sealed_ballot_validates() {
        let (mut rng, election_keys, voter) = setup();
        let ballot =
            Ballot::seal(ELECTION, election_keys.public_key(), 1, 2, &voter, &mut rng).unwrap();
        assert!(ballot.validate(ELECTION, election_keys.public_key(), 2));
    }

    #[test]
    fn zeroed_proof_is_rejected() {
        let (mut rng, election_keys, voter) = setup();
        let mut ballot =
            Ballot::seal(ELECTION, election_keys.public_key(), 1, 2, &voter, &mut rng).unwrap();
        ballot.proof = vec![0u8; 64];
        assert!(!ballot.validate(ELECTION, election_keys.public_key(), 2));
    }

    #[test]
    fn empty_proof_is_rejected() {
        let (mut rng, election_keys, voter) = setup();
        let mut ballot =
            Ballot::seal(ELECTION, election_keys.public_key(), 0, 2, &voter, &mut rng).unwrap();
        ballot.proof.clear();
        assert!(!ballot.validate(ELECTION, election_keys.public_key(), 2));
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let (mut rng, election_keys, voter) = setup();
        let mut ballot =
            Ballot::seal(ELECTION, election_keys.public_key(), 1, 2, &voter, &mut rng).unwrap();
        // Replace C1 with g^999, keep the original proof.
        ballot.ciphertext.c1 = CurvePoint::generator().mul(&Scalar::from(999u64));
        assert!(!ballot.validate(ELECTION, election_keys.public_key(), 2));
    }

    #[test]
    fn out_of_range_vote_cannot_be_sealed() {
        let (mut rng, election_keys, voter) = setup();
        assert!(Ballot::seal(ELECTION, election_keys.public_key(), 2, 2, &voter, &mut rng).is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let (mut rng, election_keys, voter) = setup();
        let ballot =
            Ballot::seal(ELECTION, election_keys.public_key(), 1, 2, &voter, &mut rng).unwrap();
        let json = serde_json::to_string(&ballot).unwrap();
        let back: Ballot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ballot);
        assert!(back.validate(ELECTION, election_keys.public_key(), 2));
    }
}
