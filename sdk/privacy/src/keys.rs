//! User key material
//!
//! A single 32-byte private key seeds both halves of a user's identity:
//!
//! ```text
//! signer  = Ed25519(seed)                       // signs note bundles
//! privacy = X25519(BLAKE3-derive("cloak-privacy-key-v1", seed))  // decrypts notes
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use x25519_dalek::{PublicKey, StaticSecret};

use cloak_primitives::{AccountId, AccountPublicKey};

use crate::PrivacyError;

/// A user's secret keys.
/// NEVER expose this struct's internals.
#[derive(Clone)]
pub struct UserKeys {
    seed: [u8; 32],
    signing_key: SigningKey,
    privacy_key: StaticSecret,
}

impl UserKeys {
    /// Generates a fresh random key set.
    pub fn random() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::from_private_key(seed)
    }

    /// Reconstructs the key set from the stored private key.
    pub fn from_private_key(seed: [u8; 32]) -> Self {
        let privacy_seed = blake3::derive_key("cloak-privacy-key-v1", &seed);
        Self {
            seed,
            signing_key: SigningKey::from_bytes(&seed),
            privacy_key: StaticSecret::from(privacy_seed),
        }
    }

    pub fn private_key(&self) -> &[u8; 32] {
        &self.seed
    }

    /// Returns the public key set (safe to share).
    pub fn public_key(&self) -> AccountPublicKey {
        AccountPublicKey {
            signer: self.signing_key.verifying_key().to_bytes(),
            privacy: PublicKey::from(&self.privacy_key).to_bytes(),
        }
    }

    pub fn account_id(&self, nonce: u32) -> AccountId {
        AccountId::new(self.public_key(), nonce)
    }

    /// X25519 secret used for note decryption and nullifier derivation.
    pub fn privacy_secret(&self) -> [u8; 32] {
        self.privacy_key.to_bytes()
    }

    pub fn sign(&self, msg: &[u8]) -> [u8; 64] {
        self.signing_key.sign(msg).to_bytes()
    }
}

impl std::fmt::Debug for UserKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserKeys")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Verify an Ed25519 signature produced by [`UserKeys::sign`].
pub fn verify_signature(
    signer: &[u8; 32],
    msg: &[u8],
    signature: &[u8; 64],
) -> Result<(), PrivacyError> {
    let key = VerifyingKey::from_bytes(signer).map_err(|_| PrivacyError::InvalidSigningKey)?;
    key.verify(msg, &Signature::from_bytes(signature))
        .map_err(|_| PrivacyError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation() {
        let keys = UserKeys::random();
        let restored = UserKeys::from_private_key(*keys.private_key());

        assert_eq!(keys.public_key(), restored.public_key());
        assert_eq!(keys.privacy_secret(), restored.privacy_secret());
        assert_ne!(keys.public_key().signer, keys.public_key().privacy);
    }

    #[test]
    fn signature_verifies_only_for_signed_message() {
        let keys = UserKeys::random();
        let sig = keys.sign(b"bundle");
        let pk = keys.public_key().signer;

        assert!(verify_signature(&pk, b"bundle", &sig).is_ok());
        assert_eq!(
            verify_signature(&pk, b"tampered", &sig),
            Err(PrivacyError::BadSignature)
        );
    }
}
