/*
    keypair.rs - Device signing keys

    ECDSA P-384 over SHA-256 digests of the canonical request string. The
    public key travels algorithm-tagged as `ecdsa-p384:<hex sec1>`; that
    tagged string IS the peer identity, everywhere. Secret bytes are
    zeroized when intermediate buffers drop.
*/

use crate::core_model::PeerId;
use p384::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p384::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

/// Algorithm tag prefixed to every public key string.
pub const KEY_ALGORITHM_TAG: &str = "ecdsa-p384";

/// Errors from key material handling.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("secret key bytes are not a valid P-384 scalar")]
    InvalidSecret,

    #[error("peer id is not an algorithm-tagged P-384 public key")]
    MalformedPeerId,
}

/// A device signing keypair, generated and held locally.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Keypair {
            signing: SigningKey::random(&mut OsRng),
        }
    }

    /// The algorithm-tagged public identity derived from this key.
    pub fn peer_id(&self) -> PeerId {
        let point = self.signing.verifying_key().to_encoded_point(true);
        PeerId::new(format!("{}:{}", KEY_ALGORITHM_TAG, hex::encode(point.as_bytes())))
    }

    /// Sign a message; returns the hex-encoded fixed-size signature.
    pub fn sign(&self, message: &[u8]) -> String {
        let digest = Sha256::digest(message);
        let signature: Signature = self
            .signing
            .sign_prehash(&digest)
            .expect("ECDSA prehash signing is infallible for a valid key");
        hex::encode(signature.to_vec())
    }

    /// Verify a hex signature against an algorithm-tagged peer id.
    ///
    /// Any malformed input verifies as false; callers distinguish
    /// malformed from forged at the edge, not here.
    pub fn verify(peer: &PeerId, message: &[u8], signature_hex: &str) -> bool {
        let verifying = match Self::verifying_key(peer) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let bytes = match hex::decode(signature_hex) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let signature = match Signature::from_slice(&bytes) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        let digest = Sha256::digest(message);
        verifying.verify_prehash(&digest, &signature).is_ok()
    }

    /// Parse the verifying key out of an algorithm-tagged peer id.
    pub fn verifying_key(peer: &PeerId) -> Result<VerifyingKey, KeyError> {
        let hex_part = peer
            .as_str()
            .strip_prefix(KEY_ALGORITHM_TAG)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or(KeyError::MalformedPeerId)?;
        let bytes = hex::decode(hex_part).map_err(|_| KeyError::MalformedPeerId)?;
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| KeyError::MalformedPeerId)
    }

    /// Export the secret scalar, hex encoded (for the device key file).
    pub fn to_secret_hex(&self) -> String {
        hex::encode(self.signing.to_bytes())
    }

    /// Restore a keypair from a hex secret produced by [`to_secret_hex`].
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(hex::decode(secret_hex).map_err(|_| KeyError::InvalidSecret)?);
        let signing = SigningKey::from_slice(&bytes).map_err(|_| KeyError::InvalidSecret)?;
        Ok(Keypair { signing })
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secret material
        f.debug_struct("Keypair").field("peer", &self.peer_id()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_round_trip() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"canonical string");

        assert!(Keypair::verify(&keypair.peer_id(), b"canonical string", &signature));
        assert!(!Keypair::verify(&keypair.peer_id(), b"tampered string", &signature));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let signature = keypair.sign(b"message");

        assert!(!Keypair::verify(&other.peer_id(), b"message", &signature));
    }

    #[test]
    fn test_peer_id_is_algorithm_tagged() {
        let keypair = Keypair::generate();
        let peer = keypair.peer_id();

        assert!(peer.as_str().starts_with("ecdsa-p384:"));
        assert!(Keypair::verifying_key(&peer).is_ok());
    }

    #[test]
    fn test_secret_hex_round_trip() {
        let keypair = Keypair::generate();
        let restored = Keypair::from_secret_hex(&keypair.to_secret_hex()).unwrap();

        assert_eq!(keypair.peer_id(), restored.peer_id());

        let signature = restored.sign(b"payload");
        assert!(Keypair::verify(&keypair.peer_id(), b"payload", &signature));
    }

    #[test]
    fn test_malformed_inputs_verify_false() {
        let keypair = Keypair::generate();

        assert!(!Keypair::verify(
            &PeerId::new("ed25519:abcd".to_string()),
            b"m",
            &keypair.sign(b"m")
        ));
        assert!(!Keypair::verify(&keypair.peer_id(), b"m", "not-hex"));
        assert!(Keypair::from_secret_hex("zz").is_err());
    }
}
