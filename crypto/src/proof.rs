//! Ballot validity and tally correctness proofs.
//!
//! The vote proof is a non-interactive Chaum-Pedersen OR proof: for a
//! ciphertext (C1, C2) and candidate set {0..k-1} it shows that
//! log_g(C1) = log_pk(C2 * g^-v) for some v, without revealing which branch
//! is real. The tally proof is a single Chaum-Pedersen equality of discrete
//! logs binding the election key to the decryption of the ballot aggregate.
//!
//! Both are Fiat-Shamir transformed over a merlin transcript; the verifier
//! rebuilds the transcript from public data only.

use merlin::Transcript;
use rand::{CryptoRng, RngCore};

use crate::elgamal::{Ciphertext, Randomness};
use crate::errors::{CryptoError, CryptoResult};
use crate::group::{
    point_to_bytes, random_scalar, scalar_from_bytes, scalar_to_bytes, CurvePoint, Scalar,
    SCALAR_BYTES,
};
use crate::keys::{KeyPair, PublicKey};

fn transcript_challenge(t: &mut Transcript) -> Scalar {
    use ark_ff::PrimeField;
    let mut buf = [0u8; 64];
    t.challenge_bytes(b"challenge", &mut buf);
    Scalar::from_le_bytes_mod_order(&buf)
}

fn vote_transcript(election_id: &str, ct: &Ciphertext, choices: u64) -> Transcript {
    let mut t = Transcript::new(b"vote_proof");
    t.append_message(b"election_id", election_id.as_bytes());
    t.append_message(b"c1", &ct.c1.to_bytes());
    t.append_message(b"c2", &ct.c2.to_bytes());
    t.append_u64(b"choices", choices);
    t
}

/// OR proof serialized as (e_0, z_0, ..., e_{k-1}, z_{k-1}).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteProof {
    branches: Vec<(Scalar, Scalar)>,
}

impl VoteProof {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.branches.len() * 2 * SCALAR_BYTES);
        for (e, z) in &self.branches {
            out.extend_from_slice(&scalar_to_bytes(e));
            out.extend_from_slice(&scalar_to_bytes(z));
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.is_empty() || bytes.len() % (2 * SCALAR_BYTES) != 0 {
            return Err(CryptoError::MalformedProof);
        }
        let mut branches = Vec::with_capacity(bytes.len() / (2 * SCALAR_BYTES));
        for pair in bytes.chunks(2 * SCALAR_BYTES) {
            let e = scalar_from_bytes(&pair[..SCALAR_BYTES])
                .map_err(|_| CryptoError::MalformedProof)?;
            let z = scalar_from_bytes(&pair[SCALAR_BYTES..])
                .map_err(|_| CryptoError::MalformedProof)?;
            branches.push((e, z));
        }
        Ok(Self { branches })
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }
}

/// Prove that `ct` encrypts `vote` from {0..choices-1} under `pk`.
///
/// `r` is the encryption randomness; the one real branch uses it, every
/// other branch is simulated with uniform challenge and response.
pub fn prove_vote<R: RngCore + CryptoRng>(
    election_id: &str,
    pk: &PublicKey,
    ct: &Ciphertext,
    r: &Randomness,
    vote: u64,
    choices: u64,
    rng: &mut R,
) -> CryptoResult<VoteProof> {
    use ark_std::Zero;

    if choices == 0 || vote >= choices {
        return Err(CryptoError::InvalidCandidate);
    }

    let g = CurvePoint::generator().0;
    let h = pk.as_point().0;
    let c1 = ct.c1.0;
    let c2 = ct.c2.0;

    let mut branches = vec![(Scalar::zero(), Scalar::zero()); choices as usize];
    let mut commits = Vec::with_capacity(choices as usize);
    let w = random_scalar(rng);

    for i in 0..choices {
        if i == vote {
            // Real branch: honest commitments, challenge filled in later.
            commits.push((g * w, h * w));
        } else {
            // Simulated branch: pick (e, z), derive commitments backwards.
            let e = random_scalar(rng);
            let z = random_scalar(rng);
            let b_target = c2 - g * Scalar::from(i);
            commits.push((g * z - c1 * e, h * z - b_target * e));
            branches[i as usize] = (e, z);
        }
    }

    let mut t = vote_transcript(election_id, ct, choices);
    for (a, b) in &commits {
        t.append_message(b"a", &point_to_bytes(a));
        t.append_message(b"b", &point_to_bytes(b));
    }
    let e = transcript_challenge(&mut t);

    let mut e_rest = Scalar::zero();
    for (i, (e_i, _)) in branches.iter().enumerate() {
        if i as u64 != vote {
            e_rest += e_i;
        }
    }
    let e_real = e - e_rest;
    let z_real = w + e_real * r.0;
    branches[vote as usize] = (e_real, z_real);

    Ok(VoteProof { branches })
}

/// Verify a serialized vote proof. Any parse failure is simply `false`.
pub fn verify_vote(
    election_id: &str,
    pk: &PublicKey,
    ct: &Ciphertext,
    choices: u64,
    proof: &[u8],
) -> bool {
    use ark_std::Zero;

    let Ok(proof) = VoteProof::from_bytes(proof) else {
        return false;
    };
    if proof.branches.len() as u64 != choices {
        return false;
    }

    let g = CurvePoint::generator().0;
    let h = pk.as_point().0;
    let c1 = ct.c1.0;
    let c2 = ct.c2.0;

    // Recompute each branch's commitments from (e_i, z_i); the two
    // Chaum-Pedersen relations hold iff these are the prover's values,
    // which the transcript challenge then binds.
    let mut t = vote_transcript(election_id, ct, choices);
    let mut e_sum = Scalar::zero();
    for (i, (e_i, z_i)) in proof.branches.iter().enumerate() {
        let b_target = c2 - g * Scalar::from(i as u64);
        let a = g * *z_i - c1 * *e_i;
        let b = h * *z_i - b_target * *e_i;
        t.append_message(b"a", &point_to_bytes(&a));
        t.append_message(b"b", &point_to_bytes(&b));
        e_sum += e_i;
    }

    let e = transcript_challenge(&mut t);
    e_sum == e
}

fn tally_transcript(election_id: &str, aggregate: &Ciphertext, counts: &[u64]) -> Transcript {
    let mut t = Transcript::new(b"tally_proof");
    t.append_message(b"election_id", election_id.as_bytes());
    t.append_message(b"c1", &aggregate.c1.to_bytes());
    t.append_message(b"c2", &aggregate.c2.to_bytes());
    t.append_u64(b"candidates", counts.len() as u64);
    for &c in counts {
        t.append_u64(b"count", c);
    }
    t
}

/// Plaintext sum committed by the counts: sum of candidate index * count.
fn declared_sum(counts: &[u64]) -> Scalar {
    let m: u64 = counts
        .iter()
        .enumerate()
        .map(|(i, c)| i as u64 * c)
        .sum();
    Scalar::from(m)
}

/// Chaum-Pedersen equality proof: log_g(pk) = log_C1(C2 * g^-m).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TallyProof {
    e: Scalar,
    z: Scalar,
}

impl TallyProof {
    pub fn to_bytes(&self) -> [u8; 2 * SCALAR_BYTES] {
        let mut out = [0u8; 2 * SCALAR_BYTES];
        out[..SCALAR_BYTES].copy_from_slice(&scalar_to_bytes(&self.e));
        out[SCALAR_BYTES..].copy_from_slice(&scalar_to_bytes(&self.z));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != 2 * SCALAR_BYTES {
            return Err(CryptoError::MalformedProof);
        }
        Ok(Self {
            e: scalar_from_bytes(&bytes[..SCALAR_BYTES]).map_err(|_| CryptoError::MalformedProof)?,
            z: scalar_from_bytes(&bytes[SCALAR_BYTES..]).map_err(|_| CryptoError::MalformedProof)?,
        })
    }
}

/// Prove that decrypting `aggregate` under the election key yields the
/// plaintext sum declared by `counts`.
pub fn prove_tally<R: RngCore + CryptoRng>(
    election_id: &str,
    keypair: &KeyPair,
    aggregate: &Ciphertext,
    counts: &[u64],
    rng: &mut R,
) -> TallyProof {
    let g = CurvePoint::generator().0;
    let c1 = aggregate.c1.0;

    let w = random_scalar(rng);
    let a = g * w;
    let b = c1 * w;

    let mut t = tally_transcript(election_id, aggregate, counts);
    t.append_message(b"a", &point_to_bytes(&a));
    t.append_message(b"b", &point_to_bytes(&b));
    let e = transcript_challenge(&mut t);

    let z = w + e * keypair.secret_key().expose();
    TallyProof { e, z }
}

/// Verify a serialized tally proof against the declared counts.
pub fn verify_tally(
    election_id: &str,
    pk: &PublicKey,
    aggregate: &Ciphertext,
    counts: &[u64],
    proof: &[u8],
) -> bool {
    let Ok(proof) = TallyProof::from_bytes(proof) else {
        return false;
    };

    let g = CurvePoint::generator().0;
    let h = pk.as_point().0;
    let c1 = aggregate.c1.0;
    let d = aggregate.c2.0 - g * declared_sum(counts);

    let a = g * proof.z - h * proof.e;
    let b = c1 * proof.z - d * proof.e;

    let mut t = tally_transcript(election_id, aggregate, counts);
    t.append_message(b"a", &point_to_bytes(&a));
    t.append_message(b"b", &point_to_bytes(&b));
    transcript_challenge(&mut t) == proof.e
}
