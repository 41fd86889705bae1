//! Schnorr signatures over G1.

use rand::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{CryptoError, CryptoResult};
use crate::group::{
    hash_to_scalar, random_scalar, scalar_from_bytes, scalar_to_bytes, CurvePoint, Scalar,
    POINT_BYTES, SCALAR_BYTES,
};
use crate::keys::{KeyPair, PublicKey};

const SIG_DOMAIN: &str = "ballotchain.schnorr.v1";

/// Serialized signature length (commitment point plus response scalar).
pub const SIGNATURE_BYTES: usize = POINT_BYTES + SCALAR_BYTES;

/// Schnorr signature (R, s) with R = g^w, s = w + e*sk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    r: CurvePoint,
    s: Scalar,
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; SIGNATURE_BYTES] {
        let mut out = [0u8; SIGNATURE_BYTES];
        out[..POINT_BYTES].copy_from_slice(&self.r.to_bytes());
        out[POINT_BYTES..].copy_from_slice(&scalar_to_bytes(&self.s));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SIGNATURE_BYTES {
            return Err(CryptoError::BadSignature);
        }
        Ok(Self {
            r: CurvePoint::from_bytes(&bytes[..POINT_BYTES])
                .map_err(|_| CryptoError::BadSignature)?,
            s: scalar_from_bytes(&bytes[POINT_BYTES..]).map_err(|_| CryptoError::BadSignature)?,
        })
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        Signature::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

fn challenge(pk: &PublicKey, r: &CurvePoint, msg: &[u8]) -> Scalar {
    hash_to_scalar(SIG_DOMAIN, &[&pk.to_bytes(), &r.to_bytes(), msg])
}

/// Sign `msg` with the keypair's secret scalar.
pub fn sign<R: RngCore + CryptoRng>(keypair: &KeyPair, msg: &[u8], rng: &mut R) -> Signature {
    let w = random_scalar(rng);
    let r = CurvePoint::generator().mul(&w);
    let e = challenge(keypair.public_key(), &r, msg);
    let s = w + e * keypair.secret_key().expose();
    Signature { r, s }
}

/// Verify `sig` over `msg` against `pk`.
pub fn verify(pk: &PublicKey, msg: &[u8], sig: &Signature) -> CryptoResult<()> {
    let e = challenge(pk, &sig.r, msg);
    let lhs = CurvePoint::generator().mul(&sig.s);
    let rhs = sig.r.add(&pk.as_point().mul(&e));
    if lhs == rhs {
        Ok(())
    } else {
        Err(CryptoError::BadSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn sign_verify_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(30);
        let kp = KeyPair::generate(&mut rng);
        let sig = sign(&kp, b"message", &mut rng);
        assert!(verify(kp.public_key(), b"message", &sig).is_ok());
    }

    #[test]
    fn rejects_wrong_message() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let kp = KeyPair::generate(&mut rng);
        let sig = sign(&kp, b"message", &mut rng);
        assert_eq!(
            verify(kp.public_key(), b"other", &sig).unwrap_err(),
            CryptoError::BadSignature
        );
    }

    #[test]
    fn rejects_wrong_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(32);
        let kp = KeyPair::generate(&mut rng);
        let other = KeyPair::generate(&mut rng);
        let sig = sign(&kp, b"message", &mut rng);
        assert_eq!(
            verify(other.public_key(), b"message", &sig).unwrap_err(),
            CryptoError::BadSignature
        );
    }

    #[test]
    fn signature_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        let kp = KeyPair::generate(&mut rng);
        let sig = sign(&kp, b"payload", &mut rng);
        let restored = Signature::from_bytes(&sig.to_bytes()).unwrap();
        assert_eq!(restored, sig);
        assert!(verify(kp.public_key(), b"payload", &restored).is_ok());
    }
}
