//! Nullifiers
//!
//! Implements nullifier derivation for double-spend prevention.
//!
//! ```text
//! Nullifier = PRF(privacy_secret, note_commitment || tree_index)
//! ```
//!
//! Once a nullifier is published, the corresponding note cannot be spent again.

use serde::{Deserialize, Serialize};

use crate::note::Commitment;

/// A nullifier (32 bytes) - unique tag for a spent note
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Nullifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Nullifier derivation key
///
/// Knowledge of this key is required to derive valid nullifiers.
#[derive(Clone)]
pub struct NullifierKey {
    key: [u8; 32],
}

impl NullifierKey {
    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Nullifier = PRF_nk(commitment || index)
    ///
    /// The tree index makes two notes with identical contents produce
    /// different nullifiers.
    pub fn derive_nullifier(&self, commitment: &Commitment, index: u64) -> Nullifier {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(b"cloak-nullifier-v1");
        hasher.update(commitment.as_bytes());
        hasher.update(&index.to_be_bytes());
        Nullifier(*hasher.finalize().as_bytes())
    }
}
