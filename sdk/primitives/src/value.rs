//! 256-bit note values.

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PrimitiveError;

/// Maximum width of a value on the wire.
pub const VALUE_BITS: u64 = 256;

/// Note value with overflow protection.
///
/// Values are unsigned 256-bit integers. Arithmetic that would leave that
/// range returns `None` instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct NoteValue(BigUint);

impl NoteValue {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn max() -> Self {
        Self((BigUint::from(1u8) << VALUE_BITS) - 1u8)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Lossy view for logging and small test values.
    pub fn to_u128(&self) -> Option<u128> {
        self.0.to_u128()
    }

    /// Checked addition
    pub fn checked_add(&self, rhs: &Self) -> Option<Self> {
        Self::bounded(&self.0 + &rhs.0)
    }

    /// Checked subtraction
    pub fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        if self.0 < rhs.0 {
            return None;
        }
        Some(Self(&self.0 - &rhs.0))
    }

    /// `max(0, self - rhs)`
    pub fn saturating_sub(&self, rhs: &Self) -> Self {
        self.checked_sub(rhs).unwrap_or_default()
    }

    /// Big-endian, left padded to 32 bytes.
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let raw = self.0.to_bytes_be();
        let mut out = [0u8; 32];
        // `bounded` guarantees at most 32 significant bytes.
        let start = 32usize.saturating_sub(raw.len());
        out[start..].copy_from_slice(&raw[raw.len().saturating_sub(32)..]);
        out
    }

    pub fn from_be_bytes(bytes: &[u8; 32]) -> Self {
        Self(BigUint::from_bytes_be(bytes))
    }

    /// Parse from a big-endian slice of at most 32 bytes.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        if bytes.len() > 32 {
            return Err(PrimitiveError::ValueOverflow);
        }
        Ok(Self(BigUint::from_bytes_be(bytes)))
    }

    /// Sum of `values`, or `None` on overflow.
    pub fn checked_sum<'a, I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a NoteValue>,
    {
        values
            .into_iter()
            .try_fold(Self::zero(), |acc, v| acc.checked_add(v))
    }

    fn bounded(value: BigUint) -> Option<Self> {
        (value.bits() <= VALUE_BITS).then_some(Self(value))
    }
}

impl From<u64> for NoteValue {
    fn from(v: u64) -> Self {
        Self(BigUint::from(v))
    }
}

impl From<u128> for NoteValue {
    fn from(v: u128) -> Self {
        Self(BigUint::from(v))
    }
}

impl TryFrom<BigUint> for NoteValue {
    type Error = PrimitiveError;

    fn try_from(value: BigUint) -> Result<Self, Self::Error> {
        Self::bounded(value).ok_or(PrimitiveError::ValueOverflow)
    }
}

impl fmt::Display for NoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
