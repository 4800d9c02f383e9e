use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PrimitiveError;

/// A 20-byte Ethereum address.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct EthAddress(pub [u8; 20]);

impl EthAddress {
    pub const LEN: usize = 20;
    pub const ZERO: Self = Self([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Right-aligned in a 32-byte ABI word.
    pub fn to_word(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        word
    }

    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut out = [0u8; 20];
        out.copy_from_slice(&word[12..]);
        Self(out)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        let arr: [u8; 20] = bytes.try_into().map_err(|_| PrimitiveError::InvalidLength {
            what: "eth address",
            expected: Self::LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Hash of an L1 transaction (or of a join-split proof).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub const LEN: usize = 32;

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| PrimitiveError::InvalidLength {
            what: "tx hash",
            expected: Self::LEN,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl AsRef<[u8]> for TxHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
