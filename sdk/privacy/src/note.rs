//! Tree Notes
//!
//! A note represents value held privately in the rollup.
//!
//! ```text
//! TreeNote = {
//!     owner:    AccountPublicKey, // who can spend / decrypt it
//!     value:    u256,             // amount in the smallest unit
//!     asset_id: u32,
//!     secret:   [u8; 32],         // blinding factor (the "viewing key secret")
//! }
//! Commitment = BLAKE3-derive("cloak-note-commitment-v1", value || asset_id || secret || owner)
//! ```

use rand::RngCore;
use serde::{Deserialize, Serialize};

use cloak_primitives::{AccountPublicKey, AssetId, NoteValue};

/// A note commitment (32 bytes), the leaf stored in the data tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A note as it appears inside a join-split proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNote {
    pub owner: AccountPublicKey,
    pub value: NoteValue,
    pub asset_id: AssetId,
    pub secret: [u8; 32],
}

impl TreeNote {
    /// Create a new note with a random secret
    pub fn new(owner: AccountPublicKey, value: NoteValue, asset_id: AssetId) -> Self {
        Self {
            owner,
            value,
            asset_id,
            secret: random_secret(),
        }
    }

    /// Create a note with an explicit secret (for recovery/decryption)
    pub fn with_secret(
        owner: AccountPublicKey,
        value: NoteValue,
        asset_id: AssetId,
        secret: [u8; 32],
    ) -> Self {
        Self {
            owner,
            value,
            asset_id,
            secret,
        }
    }

    /// Zero-value note used to pad a join-split up to two inputs.
    pub fn dummy(owner: AccountPublicKey, asset_id: AssetId) -> Self {
        Self::new(owner, NoteValue::zero(), asset_id)
    }

    pub fn commitment(&self) -> Commitment {
        let mut hasher = blake3::Hasher::new_derive_key("cloak-note-commitment-v1");
        hasher.update(&self.value.to_be_bytes());
        hasher.update(&self.asset_id.to_be_bytes());
        hasher.update(&self.secret);
        hasher.update(&self.owner.to_bytes());
        Commitment(*hasher.finalize().as_bytes())
    }
}

/// Digest of the four notes of a join-split, signed by the sender.
///
/// Binds the inputs to the outputs: changing any note changes the digest.
pub fn note_bundle_digest(inputs: &[TreeNote; 2], outputs: &[TreeNote; 2]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new_derive_key("cloak-note-bundle-v1");
    for note in inputs.iter().chain(outputs.iter()) {
        hasher.update(note.commitment().as_bytes());
    }
    *hasher.finalize().as_bytes()
}

pub fn random_secret() -> [u8; 32] {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}
