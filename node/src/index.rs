//! Committed-chain election state, derived by replay.
//!
//! The index answers the kind-specific questions that need chain context:
//! which elections exist, who has voted in them, which ciphertexts feed the
//! tally aggregate, and which transaction hashes are already committed.

use std::collections::{HashMap, HashSet};

use ballotchain_crypto::{Ciphertext, VoterId};
use ballotchain_election::Election;

use crate::block::Block;
use crate::error::ValidationError;
use crate::transaction::{Digest, Payload, Transaction};

#[derive(Clone, Debug, Default)]
pub struct ElectionIndex {
    elections: HashMap<String, Election>,
    voters: HashMap<String, HashSet<VoterId>>,
    ballots: HashMap<String, Vec<Ciphertext>>,
    tallied: HashSet<String>,
    committed: HashSet<Digest>,
}

impl ElectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn election(&self, id: &str) -> Option<&Election> {
        self.elections.get(id)
    }

    pub fn is_committed(&self, hash: &Digest) -> bool {
        self.committed.contains(hash)
    }

    pub fn has_voted(&self, election_id: &str, voter: &VoterId) -> bool {
        self.voters
            .get(election_id)
            .is_some_and(|set| set.contains(voter))
    }

    pub fn ballot_count(&self, election_id: &str) -> usize {
        self.ballots.get(election_id).map_or(0, Vec::len)
    }

    pub fn is_tallied(&self, election_id: &str) -> bool {
        self.tallied.contains(election_id)
    }

    /// Kind-specific rules that need the chain being extended.
    ///
    /// Deterministic: the transaction's own timestamp is the reference
    /// clock, so replay reaches the same verdict as first admission.
    pub fn check(&self, tx: &Transaction) -> Result<(), ValidationError> {
        if self.committed.contains(&tx.hash) {
            return Err(ValidationError::Replayed(tx.hash));
        }

        match &tx.payload {
            Payload::CreateElection(election) => {
                if self.elections.contains_key(&election.id) {
                    return Err(ValidationError::ElectionExists(election.id.clone()));
                }
            }
            Payload::CastVote(vote) => {
                let election = self
                    .elections
                    .get(&vote.election_id)
                    .ok_or_else(|| ValidationError::UnknownElection(vote.election_id.clone()))?;
                if !election.is_open_at(tx.timestamp) {
                    return Err(ValidationError::ElectionClosed(vote.election_id.clone()));
                }
                if self.has_voted(&vote.election_id, &vote.ballot.voter_id) {
                    return Err(ValidationError::DuplicateVoter);
                }
                if !vote.ballot.validate(
                    &vote.election_id,
                    &election.public_key,
                    election.candidate_count(),
                ) {
                    return Err(ValidationError::BadProof);
                }
            }
            Payload::TallyVotes(tally) => {
                let election = self
                    .elections
                    .get(&tally.election_id)
                    .ok_or_else(|| ValidationError::UnknownElection(tally.election_id.clone()))?;
                if !election.has_ended_by(tx.timestamp) {
                    return Err(ValidationError::ElectionNotEnded(tally.election_id.clone()));
                }
                if self.tallied.contains(&tally.election_id) {
                    return Err(ValidationError::AlreadyTallied(tally.election_id.clone()));
                }
                let ballots = self
                    .ballots
                    .get(&tally.election_id)
                    .map_or(&[][..], Vec::as_slice);
                if !tally.verify(election, ballots) {
                    return Err(ValidationError::BadTally);
                }
            }
        }
        Ok(())
    }

    /// Record an accepted transaction.
    pub fn apply(&mut self, tx: &Transaction) {
        self.committed.insert(tx.hash);
        match &tx.payload {
            Payload::CreateElection(election) => {
                self.elections.insert(election.id.clone(), election.clone());
            }
            Payload::CastVote(vote) => {
                self.voters
                    .entry(vote.election_id.clone())
                    .or_default()
                    .insert(vote.ballot.voter_id);
                self.ballots
                    .entry(vote.election_id.clone())
                    .or_default()
                    .push(vote.ballot.ciphertext);
            }
            Payload::TallyVotes(tally) => {
                self.tallied.insert(tally.election_id.clone());
            }
        }
    }

    /// Validate and apply every transaction of `block` on a staged copy.
    ///
    /// Either the whole block lands or none of it does; in-block duplicate
    /// voters fail because earlier transactions are already staged.
    pub fn apply_block(&self, block: &Block) -> Result<Self, ValidationError> {
        let mut staged = self.clone();
        for tx in &block.transactions {
            tx.validate(tx.timestamp)?;
            staged.check(tx)?;
            staged.apply(tx);
        }
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotchain_crypto::KeyPair;
    use ballotchain_election::{Ballot, Candidate};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use crate::transaction::CastVote;

    fn sample_election(keys: &KeyPair) -> Election {
        Election {
            id: "e1".into(),
            name: "Board".into(),
            candidates: vec![
                Candidate { id: "candidate-1".into(), name: "A".into() },
                Candidate { id: "candidate-2".into(), name: "B".into() },
            ],
            start_time: 100,
            end_time: 200,
            public_key: *keys.public_key(),
        }
    }

    fn vote_tx(
        election: &Election,
        voter: &KeyPair,
        vote: u64,
        ts: u64,
        rng: &mut ChaCha20Rng,
    ) -> Transaction {
        let ballot = Ballot::seal(
            &election.id,
            &election.public_key,
            vote,
            election.candidate_count(),
            voter,
            rng,
        )
        .unwrap();
        Transaction::create_at(
            Payload::CastVote(CastVote {
                election_id: election.id.clone(),
                ballot,
            }),
            voter,
            ts,
            rng,
        )
    }

    fn index_with_election(rng: &mut ChaCha20Rng) -> (ElectionIndex, Election, KeyPair) {
        let election_keys = KeyPair::generate(rng);
        let election = sample_election(&election_keys);
        let operator = KeyPair::generate(rng);
        let tx = Transaction::create_at(
            Payload::CreateElection(election.clone()),
            &operator,
            120,
            rng,
        );

        let mut index = ElectionIndex::new();
        index.check(&tx).unwrap();
        index.apply(&tx);
        (index, election, election_keys)
    }

    #[test]
    fn vote_lifecycle() {
        let mut rng = ChaCha20Rng::seed_from_u64(100);
        let (mut index, election, _) = index_with_election(&mut rng);

        let voter = KeyPair::generate(&mut rng);
        let tx = vote_tx(&election, &voter, 1, 150, &mut rng);
        index.check(&tx).unwrap();
        index.apply(&tx);

        assert_eq!(index.ballot_count("e1"), 1);
        assert!(index.is_committed(&tx.hash));
    }

    #[test]
    fn duplicate_voter_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(101);
        let (mut index, election, _) = index_with_election(&mut rng);

        let voter = KeyPair::generate(&mut rng);
        let first = vote_tx(&election, &voter, 1, 150, &mut rng);
        index.check(&first).unwrap();
        index.apply(&first);

        // Same voter, fresh ballot and transaction.
        let second = vote_tx(&election, &voter, 0, 160, &mut rng);
        assert_eq!(index.check(&second), Err(ValidationError::DuplicateVoter));
    }

    #[test]
    fn unknown_election_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(102);
        let election_keys = KeyPair::generate(&mut rng);
        let election = sample_election(&election_keys);
        let voter = KeyPair::generate(&mut rng);
        let tx = vote_tx(&election, &voter, 1, 150, &mut rng);

        let index = ElectionIndex::new();
        assert!(matches!(
            index.check(&tx),
            Err(ValidationError::UnknownElection(_))
        ));
    }

    #[test]
    fn vote_outside_window_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(103);
        let (index, election, _) = index_with_election(&mut rng);
        let voter = KeyPair::generate(&mut rng);
        let tx = vote_tx(&election, &voter, 1, 300, &mut rng);
        assert!(matches!(
            index.check(&tx),
            Err(ValidationError::ElectionClosed(_))
        ));
    }

    #[test]
    fn replayed_transaction_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(104);
        let (mut index, election, _) = index_with_election(&mut rng);
        let voter = KeyPair::generate(&mut rng);
        let tx = vote_tx(&election, &voter, 1, 150, &mut rng);
        index.check(&tx).unwrap();
        index.apply(&tx);
        assert!(matches!(index.check(&tx), Err(ValidationError::Replayed(_))));
    }

    #[test]
    fn tally_requires_ended_election() {
        let mut rng = ChaCha20Rng::seed_from_u64(105);
        let (mut index, election, election_keys) = index_with_election(&mut rng);

        let voter = KeyPair::generate(&mut rng);
        let vote = vote_tx(&election, &voter, 1, 150, &mut rng);
        index.check(&vote).unwrap();
        index.apply(&vote);

        let ballots = vec![vote_ballot_ciphertext(&vote)];
        let payload = ballotchain_election::compute_tally(
            &election,
            &election_keys,
            &ballots,
            &mut rng,
        )
        .unwrap();

        let trustee = KeyPair::generate(&mut rng);
        let early = Transaction::create_at(
            Payload::TallyVotes(payload.clone()),
            &trustee,
            180,
            &mut rng,
        );
        assert!(matches!(
            index.check(&early),
            Err(ValidationError::ElectionNotEnded(_))
        ));

        let on_time = Transaction::create_at(Payload::TallyVotes(payload), &trustee, 250, &mut rng);
        index.check(&on_time).unwrap();
        index.apply(&on_time);
        assert!(index.is_tallied("e1"));

        // A second tally for the same election loses.
        let again = vote_like_tally(&election, &election_keys, &ballots, 260, &mut rng);
        assert!(matches!(
            index.check(&again),
            Err(ValidationError::AlreadyTallied(_))
        ));
    }

    #[test]
    fn tally_with_wrong_counts_is_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(106);
        let (mut index, election, election_keys) = index_with_election(&mut rng);

        let voter = KeyPair::generate(&mut rng);
        let vote = vote_tx(&election, &voter, 1, 150, &mut rng);
        index.check(&vote).unwrap();
        index.apply(&vote);

        let ballots = vec![vote_ballot_ciphertext(&vote)];
        let mut payload =
            ballotchain_election::compute_tally(&election, &election_keys, &ballots, &mut rng)
                .unwrap();
        payload.counts = vec![1, 0];

        let trustee = KeyPair::generate(&mut rng);
        let tx = Transaction::create_at(Payload::TallyVotes(payload), &trustee, 250, &mut rng);
        assert_eq!(index.check(&tx), Err(ValidationError::BadTally));
    }

    fn vote_ballot_ciphertext(tx: &Transaction) -> Ciphertext {
        match &tx.payload {
            Payload::CastVote(v) => v.ballot.ciphertext,
            _ => unreachable!(),
        }
    }

    fn vote_like_tally(
        election: &Election,
        keys: &KeyPair,
        ballots: &[Ciphertext],
        ts: u64,
        rng: &mut ChaCha20Rng,
    ) -> Transaction {
        let payload =
            ballotchain_election::compute_tally(election, keys, ballots, rng).unwrap();
        let trustee = KeyPair::generate(rng);
        Transaction::create_at(Payload::TallyVotes(payload), &trustee, ts, rng)
    }
}
