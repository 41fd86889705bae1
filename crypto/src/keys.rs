//! Key generation and identity derivation.

use rand::{CryptoRng, RngCore};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

use crate::errors::CryptoError;
use crate::group::{
    random_scalar, scalar_from_bytes, scalar_to_bytes, CurvePoint, Scalar, POINT_BYTES,
};

const VOTER_ID_DOMAIN: &str = "ballotchain.voter-id.v1";

/// Number of bytes of the public key used for the short node address.
const ADDRESS_BYTES: usize = 8;

/// Public key pk = g^sk. Never the identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey(pub(crate) CurvePoint);

impl PublicKey {
    pub fn to_bytes(&self) -> [u8; POINT_BYTES] {
        self.0.to_bytes()
    }

    /// Decode a public key, rejecting malformed points and the identity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let point = CurvePoint::from_bytes(bytes)?;
        if point.is_identity() {
            return Err(CryptoError::MalformedPoint);
        }
        Ok(Self(point))
    }

    pub fn as_point(&self) -> &CurvePoint {
        &self.0
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        PublicKey::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

/// Secret scalar sk in [1, q-1]. Zeroed on drop.
#[derive(Clone)]
pub struct SecretKey(pub(crate) Scalar);

impl SecretKey {
    pub fn to_bytes(&self) -> [u8; 32] {
        scalar_to_bytes(&self.0)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        use ark_std::Zero;
        let scalar = scalar_from_bytes(bytes)?;
        if scalar.is_zero() {
            return Err(CryptoError::MalformedScalar);
        }
        Ok(Self(scalar))
    }

    pub(crate) fn expose(&self) -> &Scalar {
        &self.0
    }
}

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        use ark_std::Zero;
        self.0 = Scalar::zero();
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Signing/decryption keypair.
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    /// Sample sk uniformly in [1, q-1] and derive pk = g^sk.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let sk = random_scalar(rng);
        Self::from_secret(SecretKey(sk))
    }

    pub fn from_secret(secret: SecretKey) -> Self {
        let public = PublicKey(CurvePoint::generator().mul(secret.expose()));
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

/// Fixed-length voter identifier derived from the voter's public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoterId([u8; 32]);

impl VoterId {
    pub fn from_public_key(pk: &PublicKey) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(VOTER_ID_DOMAIN);
        hasher.update(&pk.to_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| CryptoError::MalformedScalar)?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for VoterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VoterId({})", &hex::encode(self.0)[..16])
    }
}

impl std::fmt::Display for VoterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &hex::encode(self.0)[..16])
    }
}

impl Serialize for VoterId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for VoterId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        VoterId::from_bytes(&bytes).map_err(de::Error::custom)
    }
}

/// Short node address: hex of the leading public key bytes.
pub fn derive_address(pk: &PublicKey) -> String {
    hex::encode(&pk.to_bytes()[..ADDRESS_BYTES])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn public_key_is_not_identity() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        for _ in 0..8 {
            let kp = KeyPair::generate(&mut rng);
            assert!(!kp.public_key().as_point().is_identity());
        }
    }

    #[test]
    fn public_key_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let kp = KeyPair::generate(&mut rng);
        let restored = PublicKey::from_bytes(&kp.public_key().to_bytes()).unwrap();
        assert_eq!(restored, *kp.public_key());
    }

    #[test]
    fn identity_public_key_is_rejected() {
        let identity = CurvePoint::identity().to_bytes();
        assert_eq!(
            PublicKey::from_bytes(&identity).unwrap_err(),
            CryptoError::MalformedPoint
        );
    }

    #[test]
    fn voter_id_is_deterministic() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let kp = KeyPair::generate(&mut rng);
        let a = VoterId::from_public_key(kp.public_key());
        let b = VoterId::from_public_key(kp.public_key());
        assert_eq!(a, b);

        let other = KeyPair::generate(&mut rng);
        assert_ne!(a, VoterId::from_public_key(other.public_key()));
    }

    #[test]
    fn address_is_fixed_length() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        let kp = KeyPair::generate(&mut rng);
        assert_eq!(derive_address(kp.public_key()).len(), 16);
    }

    #[test]
    fn secret_key_roundtrip() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let kp = KeyPair::generate(&mut rng);
        let restored = SecretKey::from_bytes(&kp.secret_key().to_bytes()).unwrap();
        let rebuilt = KeyPair::from_secret(restored);
        assert_eq!(rebuilt.public_key(), kp.public_key());
    }
}
