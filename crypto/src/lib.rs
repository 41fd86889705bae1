//! Cryptographic primitives for the election ledger.
//!
//! Everything operates in the prime-order G1 subgroup of the bn254 pairing
//! curve: key generation, exponential ElGamal encryption of candidate
//! indices, Schnorr signatures over transaction and block hashes, and the
//! Chaum-Pedersen proofs that make ballots and tallies publicly verifiable.

pub mod codec;
pub mod elgamal;
pub mod errors;
pub mod group;
pub mod keys;
pub mod proof;
pub mod schnorr;

pub use elgamal::{decrypt, encrypt, Ciphertext, Randomness};
pub use errors::{CryptoError, CryptoResult};
pub use group::{hash_to_scalar, random_scalar, CurvePoint, Scalar, POINT_BYTES, SCALAR_BYTES};
pub use keys::{derive_address, KeyPair, PublicKey, SecretKey, VoterId};
pub use proof::{
    prove_tally, prove_vote, verify_tally, verify_vote, TallyProof, VoteProof,
};
pub use schnorr::{sign, verify, Signature, SIGNATURE_BYTES};
