//! Cloak primitive types
//!
//! Value, key, identifier and path types shared by every Cloak crate.

pub mod account;
pub mod address;
pub mod hash_path;
pub mod value;

pub use account::{AccountId, AccountPublicKey, AliasHash};
pub use address::{EthAddress, TxHash};
pub use hash_path::{DATA_TREE_DEPTH, HashPath};
pub use value::NoteValue;

use thiserror::Error;

/// Asset identifier (0 is the native asset).
pub type AssetId = u32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrimitiveError {
    #[error("invalid {what} length: expected {expected}, got {got}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("value does not fit in 256 bits")]
    ValueOverflow,

    #[error("truncated input: {0}")]
    Truncated(&'static str),
}
