//! Join-split assembly
//!
//! ```text
//!   user notes ──► NotePicker ──► inputs (padded to 2 with dummies)
//!                                    │
//!   WorldState ── root, hash paths ──┤
//!                                    ▼
//!   outputs [dest, change] ──► JoinSplitTx ──► JoinSplitProver ──► proof bytes
//!        │                                                            │
//!        └──► viewing keys                    deposit? ──► EthSigner ─┘
//! ```

pub mod builder;
pub mod prover;
pub mod signer;
pub mod tx;

use std::time::Duration;
use thiserror::Error;

use cloak_block::DecodeError;
use cloak_primitives::NoteValue;
use cloak_privacy::PrivacyError;

use crate::note_picker::NotePickerError;

pub use builder::{JoinSplitProofOutput, JoinSplitRequest, JoinSplitTxBuilder};
pub use prover::{JoinSplitProver, WorldState};
pub use signer::{
    EthSigner, LocalEthSigner, deposit_signing_digest, eth_message_hash, normalize_recovery_byte,
    recover_address,
};
pub use tx::JoinSplitTx;

#[derive(Debug, Error)]
pub enum JoinSplitError {
    #[error("insufficient funds: need {required}, best two notes hold {available}")]
    InsufficientFunds {
        required: NoteValue,
        available: NoteValue,
    },
    #[error("deposit requires an ethereum signer")]
    SignerRequired,
    #[error("note values overflow 256 bits")]
    ValueOverflow,
    #[error("proof not produced within {0:?}")]
    ProofTimeout(Duration),
    #[error("world state: {0:#}")]
    WorldState(anyhow::Error),
    #[error("prover: {0:#}")]
    Prover(anyhow::Error),
    #[error("signer: {0:#}")]
    Signer(anyhow::Error),
    #[error("malformed deposit signature ({0} bytes)")]
    InvalidSignature(usize),
    #[error(transparent)]
    Privacy(#[from] PrivacyError),
    #[error(transparent)]
    Encoding(#[from] DecodeError),
}

impl From<NotePickerError> for JoinSplitError {
    fn from(err: NotePickerError) -> Self {
        match err {
            NotePickerError::InsufficientFunds {
                required,
                available,
            } => Self::InsufficientFunds {
                required,
                available,
            },
        }
    }
}
