//! Scalar and point arithmetic on the bn254 G1 subgroup.
//!
//! Points travel in the 32-byte compressed encoding; deserialization rejects
//! anything off the curve or outside the prime-order subgroup. Scalars use
//! the canonical little-endian field encoding.

use ark_bn254::{Fr, G1Affine, G1Projective};
use ark_ec::{CurveGroup, Group};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{UniformRand, Zero};
use rand::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::CryptoError;

/// Scalar modulo the group order q.
pub type Scalar = Fr;

/// Compressed point encoding length.
pub const POINT_BYTES: usize = 32;
/// Canonical scalar encoding length.
pub const SCALAR_BYTES: usize = 32;

/// Element of the prime-order subgroup G1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurvePoint(pub(crate) G1Projective);

impl CurvePoint {
    /// The fixed group generator g.
    pub fn generator() -> Self {
        Self(G1Projective::generator())
    }

    /// The additive identity.
    pub fn identity() -> Self {
        Self(G1Projective::zero())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    /// Scalar multiplication.
    pub fn mul(&self, s: &Scalar) -> Self {
        Self(self.0 * s)
    }

    /// Point addition.
    pub fn add(&self, other: &Self) -> Self {
        Self(self.0 + other.0)
    }

    /// Point subtraction.
    pub fn sub(&self, other: &Self) -> Self {
        Self(self.0 - other.0)
    }

    /// Canonical compressed encoding.
    pub fn to_bytes(&self) -> [u8; POINT_BYTES] {
        point_to_bytes(&self.0)
    }

    /// Decode and validate a compressed point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self(point_from_bytes(bytes)?))
    }
}

impl Serialize for CurvePoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for CurvePoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        CurvePoint::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

pub(crate) fn point_to_bytes(p: &G1Projective) -> [u8; POINT_BYTES] {
    let mut buf = [0u8; POINT_BYTES];
    // Compressed bn254 G1 always fits the fixed buffer.
    let _ = p.into_affine().serialize_compressed(&mut buf[..]);
    buf
}

pub(crate) fn point_from_bytes(bytes: &[u8]) -> Result<G1Projective, CryptoError> {
    if bytes.len() != POINT_BYTES {
        return Err(CryptoError::MalformedPoint);
    }
    // deserialize_compressed validates the curve equation and subgroup.
    let affine =
        G1Affine::deserialize_compressed(bytes).map_err(|_| CryptoError::MalformedPoint)?;
    Ok(affine.into())
}

pub(crate) fn scalar_to_bytes(s: &Scalar) -> [u8; SCALAR_BYTES] {
    let mut buf = [0u8; SCALAR_BYTES];
    let _ = s.serialize_compressed(&mut buf[..]);
    buf
}

pub(crate) fn scalar_from_bytes(bytes: &[u8]) -> Result<Scalar, CryptoError> {
    if bytes.len() != SCALAR_BYTES {
        return Err(CryptoError::MalformedScalar);
    }
    Fr::deserialize_compressed(bytes).map_err(|_| CryptoError::MalformedScalar)
}

/// Sample a uniform scalar in [1, q-1].
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    loop {
        let s = Fr::rand(rng);
        if !s.is_zero() {
            return s;
        }
    }
}

/// Derive a scalar from arbitrary input under a domain label.
///
/// Length-prefixes every part so distinct inputs cannot collide, then
/// reduces 64 bytes of blake3 XOF output mod q.
pub fn hash_to_scalar(domain: &str, parts: &[&[u8]]) -> Scalar {
    use ark_ff::PrimeField;

    let mut hasher = blake3::Hasher::new_derive_key(domain);
    for part in parts {
        hasher.update(&(part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    let mut wide = [0u8; 64];
    hasher.finalize_xof().fill(&mut wide);
    Fr::from_le_bytes_mod_order(&wide)
}
