use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PrimitiveError;

/// The public half of a user's key set.
///
/// `signer` is the Ed25519 key that signs note bundles, `privacy` is the
/// X25519 key that output notes are encrypted to.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct AccountPublicKey {
    pub signer: [u8; 32],
    pub privacy: [u8; 32],
}

impl AccountPublicKey {
    pub const LEN: usize = 64;

    pub fn new(signer: [u8; 32], privacy: [u8; 32]) -> Self {
        Self { signer, privacy }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..32].copy_from_slice(&self.signer);
        out[32..].copy_from_slice(&self.privacy);
        out
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        if bytes.len() != Self::LEN {
            return Err(PrimitiveError::InvalidLength {
                what: "account public key",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let mut signer = [0u8; 32];
        let mut privacy = [0u8; 32];
        signer.copy_from_slice(&bytes[..32]);
        privacy.copy_from_slice(&bytes[32..]);
        Ok(Self { signer, privacy })
    }
}

impl fmt::Display for AccountPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

/// A user identifier: public key plus account nonce.
///
/// Nonce 0 means the key has no registered account (no alias yet).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct AccountId {
    pub public_key: AccountPublicKey,
    pub nonce: u32,
}

impl AccountId {
    pub const LEN: usize = AccountPublicKey::LEN + 4;

    pub fn new(public_key: AccountPublicKey, nonce: u32) -> Self {
        Self { public_key, nonce }
    }

    /// Storage key: public key followed by the big-endian nonce.
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..AccountPublicKey::LEN].copy_from_slice(&self.public_key.to_bytes());
        out[AccountPublicKey::LEN..].copy_from_slice(&self.nonce.to_be_bytes());
        out
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        if bytes.len() != Self::LEN {
            return Err(PrimitiveError::InvalidLength {
                what: "account id",
                expected: Self::LEN,
                got: bytes.len(),
            });
        }
        let public_key = AccountPublicKey::from_slice(&bytes[..AccountPublicKey::LEN])?;
        let mut nonce = [0u8; 4];
        nonce.copy_from_slice(&bytes[AccountPublicKey::LEN..]);
        Ok(Self {
            public_key,
            nonce: u32::from_be_bytes(nonce),
        })
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (nonce {})", self.public_key, self.nonce)
    }
}

/// Hash of a human readable alias.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct AliasHash(pub [u8; 28]);

impl AliasHash {
    pub const LEN: usize = 28;

    /// Aliases are case-insensitive.
    pub fn from_alias(alias: &str) -> Self {
        let digest = blake3::Hasher::new_derive_key("cloak-alias-v1")
            .update(alias.to_lowercase().as_bytes())
            .finalize();
        let mut out = [0u8; Self::LEN];
        out.copy_from_slice(&digest.as_bytes()[..Self::LEN]);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 28] {
        &self.0
    }
}

impl fmt::Display for AliasHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
