//! Note Encryption
//!
//! Encrypts note data for the recipient using ECDH + ChaCha20-Poly1305.
//!
//! ```text
//! Flow:
//! 1. Sender generates ephemeral keypair (epk, esk)
//! 2. Shared secret = ECDH(esk, recipient_privacy_pk)
//! 3. Encryption key = HKDF-SHA256(salt = epk, ikm = shared_secret, "cloak-note-v1")
//! 4. Ciphertext = ChaCha20-Poly1305(key, nonce, value || asset_id || secret)
//! 5. Viewing key = epk || nonce || ciphertext || tag   (always 128 bytes)
//! ```
//!
//! The fixed size lets a rollup's viewing-key blob be split without framing.

use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use cloak_primitives::{AccountPublicKey, NoteValue};

use crate::PrivacyError;
use crate::note::TreeNote;

const PLAINTEXT_SIZE: usize = 32 + 4 + 32;
const TAG_SIZE: usize = 16;

/// Size of one encrypted output note on the wire.
pub const VIEWING_KEY_SIZE: usize = 32 + 12 + PLAINTEXT_SIZE + TAG_SIZE;

/// An encrypted output note (published with the rollup)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewingKey(Vec<u8>);

impl ViewingKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, PrivacyError> {
        if bytes.len() != VIEWING_KEY_SIZE {
            return Err(PrivacyError::InvalidViewingKey(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    fn ephemeral_pk(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[..32]);
        out
    }

    fn nonce(&self) -> &[u8] {
        &self.0[32..44]
    }

    fn ciphertext(&self) -> &[u8] {
        &self.0[44..]
    }
}

/// Encrypt a note to its owner's privacy key
pub fn encrypt_note(note: &TreeNote) -> Result<ViewingKey, PrivacyError> {
    let mut rng = rand::thread_rng();
    let ephemeral_secret = EphemeralSecret::random_from_rng(&mut rng);
    let ephemeral_pk = PublicKey::from(&ephemeral_secret);

    let recipient = PublicKey::from(note.owner.privacy);
    let shared_secret = ephemeral_secret.diffie_hellman(&recipient);
    let key = derive_note_key(shared_secret.as_bytes(), ephemeral_pk.as_bytes())?;

    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = ChaCha20Poly1305::new_from_slice(&key).map_err(|_| PrivacyError::Encryption)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), serialize_plaintext(note).as_slice())
        .map_err(|_| PrivacyError::Encryption)?;

    let mut out = Vec::with_capacity(VIEWING_KEY_SIZE);
    out.extend_from_slice(ephemeral_pk.as_bytes());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    ViewingKey::from_bytes(out)
}

/// Try to decrypt a viewing key with the recipient's privacy secret
///
/// Returns `None` if the note was not encrypted to this key (scan mode).
pub fn decrypt_note(
    viewing_key: &ViewingKey,
    privacy_secret: &[u8; 32],
    owner: AccountPublicKey,
) -> Option<TreeNote> {
    let secret = StaticSecret::from(*privacy_secret);
    let ephemeral_pk = viewing_key.ephemeral_pk();
    let shared_secret = secret.diffie_hellman(&PublicKey::from(ephemeral_pk));
    let key = derive_note_key(shared_secret.as_bytes(), &ephemeral_pk).ok()?;

    let cipher = ChaCha20Poly1305::new_from_slice(&key).ok()?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(viewing_key.nonce()), viewing_key.ciphertext())
        .ok()?;

    deserialize_plaintext(&plaintext, owner)
}

fn derive_note_key(shared_secret: &[u8], ephemeral_pk: &[u8]) -> Result<[u8; 32], PrivacyError> {
    let hk = Hkdf::<Sha256>::new(Some(ephemeral_pk), shared_secret);
    let mut key = [0u8; 32];
    hk.expand(b"cloak-note-v1", &mut key)
        .map_err(|_| PrivacyError::Encryption)?;
    Ok(key)
}

fn serialize_plaintext(note: &TreeNote) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(PLAINTEXT_SIZE);
    bytes.extend_from_slice(&note.value.to_be_bytes());
    bytes.extend_from_slice(&note.asset_id.to_be_bytes());
    bytes.extend_from_slice(&note.secret);
    bytes
}

fn deserialize_plaintext(bytes: &[u8], owner: AccountPublicKey) -> Option<TreeNote> {
    if bytes.len() != PLAINTEXT_SIZE {
        return None;
    }
    let value: [u8; 32] = bytes[0..32].try_into().ok()?;
    let asset_id = u32::from_be_bytes(bytes[32..36].try_into().ok()?);
    let secret: [u8; 32] = bytes[36..68].try_into().ok()?;

    Some(TreeNote::with_secret(
        owner,
        NoteValue::from_be_bytes(&value),
        asset_id,
        secret,
    ))
}

/// Split a concatenated viewing-key blob into fixed-size viewing keys.
pub fn split_viewing_keys(blob: &[u8]) -> Result<Vec<ViewingKey>, PrivacyError> {
    if blob.len() % VIEWING_KEY_SIZE != 0 {
        return Err(PrivacyError::InvalidViewingKey(blob.len()));
    }
    blob.chunks_exact(VIEWING_KEY_SIZE)
        .map(|chunk| ViewingKey::from_bytes(chunk.to_vec()))
        .collect()
}
