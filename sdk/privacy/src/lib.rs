//! Cloak Privacy SDK
//!
//! Note-based privacy primitives for join-split transactions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Join-Split Transaction                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐ │
//! │  │  Nullifiers  │  │ Commitments  │  │    Viewing Keys       │ │
//! │  │  (2 inputs)  │  │  (2 outputs) │  │  (encrypted outputs)  │ │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘ │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              ZK Proof (external prover)                  │   │
//! │  │  • Valid nullifier derivation                            │   │
//! │  │  • Valid commitment structure                            │   │
//! │  │  • Balance: Σ inputs + public in = Σ outputs + public out│   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod encryption;
pub mod keys;
pub mod note;
pub mod nullifier;

pub use encryption::{VIEWING_KEY_SIZE, ViewingKey, decrypt_note, encrypt_note, split_viewing_keys};
pub use keys::{UserKeys, verify_signature};
pub use note::{Commitment, TreeNote, note_bundle_digest, random_secret};
pub use nullifier::{Nullifier, NullifierKey};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrivacyError {
    #[error("note encryption failed")]
    Encryption,

    #[error("viewing key has invalid length {0}")]
    InvalidViewingKey(usize),

    #[error("invalid signing key")]
    InvalidSigningKey,

    #[error("signature verification failed")]
    BadSignature,
}
