//! Exponential ElGamal over G1.
//!
//! Plaintexts live in the exponent, so componentwise addition of ciphertexts
//! yields an encryption of the plaintext sum. Decryption recovers g^m and
//! the exponent is found by a bounded scan, which is plenty for vote counts.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::errors::CryptoError;
use crate::group::{random_scalar, CurvePoint, Scalar, POINT_BYTES};
use crate::keys::{PublicKey, SecretKey};

/// ElGamal ciphertext pair (C1, C2) = (g^r, pk^r * g^m).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub c1: CurvePoint,
    pub c2: CurvePoint,
}

impl Ciphertext {
    /// Encryption of zero with zero randomness; the additive identity.
    pub fn identity() -> Self {
        Self {
            c1: CurvePoint::identity(),
            c2: CurvePoint::identity(),
        }
    }

    /// Homomorphic addition: Enc(a) + Enc(b) = Enc(a + b).
    pub fn add(&self, other: &Self) -> Self {
        Self {
            c1: self.c1.add(&other.c1),
            c2: self.c2.add(&other.c2),
        }
    }

    pub fn to_bytes(&self) -> [u8; 2 * POINT_BYTES] {
        let mut out = [0u8; 2 * POINT_BYTES];
        out[..POINT_BYTES].copy_from_slice(&self.c1.to_bytes());
        out[POINT_BYTES..].copy_from_slice(&self.c2.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 2 * POINT_BYTES {
            return Err(CryptoError::MalformedPoint);
        }
        Ok(Self {
            c1: CurvePoint::from_bytes(&bytes[..POINT_BYTES])?,
            c2: CurvePoint::from_bytes(&bytes[POINT_BYTES..])?,
        })
    }
}

/// Encryption randomness, needed once for proof generation. Zeroed on drop.
pub struct Randomness(pub(crate) Scalar);

impl Zeroize for Randomness {
    fn zeroize(&mut self) {
        use ark_std::Zero;
        self.0 = Scalar::zero();
    }
}

impl Drop for Randomness {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Encrypt the integer `m` under `pk`.
pub fn encrypt<R: RngCore + CryptoRng>(
    pk: &PublicKey,
    m: u64,
    rng: &mut R,
) -> (Ciphertext, Randomness) {
    let r = random_scalar(rng);
    let g = CurvePoint::generator();
    let ct = Ciphertext {
        c1: g.mul(&r),
        c2: pk.as_point().mul(&r).add(&g.mul(&Scalar::from(m))),
    };
    (ct, Randomness(r))
}

/// Recover the plaintext exponent of `ct`, scanning 0..=max.
pub fn decrypt(sk: &SecretKey, ct: &Ciphertext, max: u64) -> Option<u64> {
    let shared = ct.c1.mul(sk.expose());
    let target = ct.c2.sub(&shared);
    let g = CurvePoint::generator();
    let mut acc = CurvePoint::identity();
    for m in 0..=max {
        if acc == target {
            return Some(m);
        }
        acc = acc.add(&g);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(20);
        let kp = KeyPair::generate(&mut rng);
        for m in [0u64, 1, 5, 17] {
            let (ct, _r) = encrypt(kp.public_key(), m, &mut rng);
            assert_eq!(decrypt(kp.secret_key(), &ct, 32), Some(m));
        }
    }

    #[test]
    fn decrypt_fails_outside_bound() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let kp = KeyPair::generate(&mut rng);
        let (ct, _r) = encrypt(kp.public_key(), 10, &mut rng);
        assert_eq!(decrypt(kp.secret_key(), &ct, 5), None);
    }

    #[test]
    fn homomorphic_sum() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let kp = KeyPair::generate(&mut rng);

        let votes = [1u64, 0, 1];
        let mut aggregate = Ciphertext::identity();
        for &v in &votes {
            let (ct, _r) = encrypt(kp.public_key(), v, &mut rng);
            aggregate = aggregate.add(&ct);
        }

        assert_eq!(decrypt(kp.secret_key(), &aggregate, 10), Some(2));
    }

    #[test]
    fn ciphertext_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let kp = KeyPair::generate(&mut rng);
        let (ct, _r) = encrypt(kp.public_key(), 3, &mut rng);
        assert_eq!(Ciphertext::from_bytes(&ct.to_bytes()).unwrap(), ct);
    }

    #[test]
    fn wrong_key_decrypts_to_garbage() {
        let mut rng = ChaCha20Rng::seed_from_u64(24);
        let kp = KeyPair::generate(&mut rng);
        let other = KeyPair::generate(&mut rng);
        let (ct, _r) = encrypt(kp.public_key(), 2, &mut rng);
        assert_ne!(decrypt(other.secret_key(), &ct, 32), Some(2));
    }
}
