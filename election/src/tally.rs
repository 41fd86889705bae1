//! Tally payloads: declared per-candidate counts with a decryption proof.
//!
//! Validators never hold the election secret; they recompute the homomorphic
//! aggregate of every committed ballot and check the trustee's Chaum-Pedersen
//! proof against it. The trustee side (`compute_tally`) runs off-chain.

use ballotchain_crypto::codec::{put_bytes, put_str, put_u64};
use ballotchain_crypto::{decrypt, prove_tally, verify_tally, Ciphertext, KeyPair};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::election::Election;
use crate::serde_hex;

/// Declared election result, committed by a TallyVotes transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyPayload {
    pub election_id: String,
    /// Ballot count per candidate, indexed like the candidate list.
    pub counts: Vec<u64>,
    #[serde(with = "serde_hex")]
    pub proof: Vec<u8>,
}

impl TallyPayload {
    /// Verify against the aggregate of `ballots`, the ciphertexts of every
    /// CastVote committed for this election in the chain being extended.
    pub fn verify(&self, election: &Election, ballots: &[Ciphertext]) -> bool {
        if self.counts.len() as u64 != election.candidate_count() {
            return false;
        }
        if self.counts.iter().sum::<u64>() != ballots.len() as u64 {
            return false;
        }
        let aggregate = ballots
            .iter()
            .fold(Ciphertext::identity(), |acc, ct| acc.add(ct));
        verify_tally(
            &self.election_id,
            &election.public_key,
            &aggregate,
            &self.counts,
            &self.proof,
        )
    }

    /// Deterministic encoding used for transaction hashing.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_str(&mut out, &self.election_id);
        put_u64(&mut out, self.counts.len() as u64);
        for &c in &self.counts {
            put_u64(&mut out, c);
        }
        put_bytes(&mut out, &self.proof);
        out
    }
}

/// Decrypt every ballot with the election secret, count the votes and prove
/// the result. Returns None if any ballot fails to decrypt in range, which
/// cannot happen for ballots that passed proof verification.
pub fn compute_tally<R: RngCore + CryptoRng>(
    election: &Election,
    election_keys: &KeyPair,
    ballots: &[Ciphertext],
    rng: &mut R,
) -> Option<TallyPayload> {
    let k = election.candidate_count();
    let mut counts = vec![0u64; k as usize];
    for ct in ballots {
        let v = decrypt(election_keys.secret_key(), ct, k.saturating_sub(1))?;
        counts[v as usize] += 1;
    }

    let aggregate = ballots
        .iter()
        .fold(Ciphertext::identity(), |acc, ct| acc.add(ct));
    let proof = prove_tally(&election.id, election_keys, &aggregate, &counts, rng);

    Some(TallyPayload {
        election_id: election.id.clone(),
        counts,
        proof: proof.to_bytes().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ballot::Ballot;
    use crate::election::Candidate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn election_with_keys(rng: &mut ChaCha20Rng) -> (Election, KeyPair) {
        let keys = KeyPair::generate(rng);
        let election = Election {
            id: "e1".into(),
            name: "Board".into(),
            candidates: vec![
                Candidate { id: "candidate-1".into(), name: "A".into() },
                Candidate { id: "candidate-2".into(), name: "B".into() },
            ],
            start_time: 100,
            end_time: 200,
            public_key: *keys.public_key(),
        };
        (election, keys)
    }

    fn cast(election: &Election, vote: u64, rng: &mut ChaCha20Rng) -> Ciphertext {
        let voter = KeyPair::generate(rng);
        Ballot::seal(
            &election.id,
            &election.public_key,
            vote,
            election.candidate_count(),
            &voter,
            rng,
        )
        .unwrap()
        .ciphertext
    }

    #[test]
    fn computed_tally_verifies() {
        let mut rng = ChaCha20Rng::seed_from_u64(70);
        let (election, keys) = election_with_keys(&mut rng);

        let ballots: Vec<_> = [1u64, 0, 1]
            .iter()
            .map(|&v| cast(&election, v, &mut rng))
            .collect();

        let tally = compute_tally(&election, &keys, &ballots, &mut rng).unwrap();
        assert_eq!(tally.counts, vec![1, 2]);
        assert!(tally.verify(&election, &ballots));
    }

    #[test]
    fn rejects_miscounted_tally() {
        let mut rng = ChaCha20Rng::seed_from_u64(71);
        let (election, keys) = election_with_keys(&mut rng);

        let ballots: Vec<_> = [1u64, 1]
            .iter()
            .map(|&v| cast(&election, v, &mut rng))
            .collect();

        let mut tally = compute_tally(&election, &keys, &ballots, &mut rng).unwrap();
        tally.counts = vec![2, 0];
        assert!(!tally.verify(&election, &ballots));
    }

    #[test]
    fn rejects_count_sum_mismatch() {
        let mut rng = ChaCha20Rng::seed_from_u64(72);
        let (election, keys) = election_with_keys(&mut rng);

        let ballots: Vec<_> = [0u64, 1]
            .iter()
            .map(|&v| cast(&election, v, &mut rng))
            .collect();

        let mut tally = compute_tally(&election, &keys, &ballots, &mut rng).unwrap();
        tally.counts = vec![1, 2];
        assert!(!tally.verify(&election, &ballots));
    }

    #[test]
    fn rejects_wrong_candidate_arity() {
        let mut rng = ChaCha20Rng::seed_from_u64(73);
        let (election, keys) = election_with_keys(&mut rng);
        let ballots = vec![cast(&election, 0, &mut rng)];

        let mut tally = compute_tally(&election, &keys, &ballots, &mut rng).unwrap();
        tally.counts.push(0);
        assert!(!tally.verify(&election, &ballots));
    }

    #[test]
    fn empty_election_tallies_to_zero() {
        let mut rng = ChaCha20Rng::seed_from_u64(74);
        let (election, keys) = election_with_keys(&mut rng);
        let tally = compute_tally(&election, &keys, &[], &mut rng).unwrap();
        assert_eq!(tally.counts, vec![0, 0]);
        assert!(tally.verify(&election, &[]));
    }
}
