//! Ethereum-style signatures for public deposits.
//!
//! ```text
//! digest   = keccak256(public_input | asset_id | input_owner | tx_hash)   (32-byte words)
//! message  = keccak256("\x19Ethereum Signed Message:\n32" | digest)
//! sig      = r | s | v,  v in {27, 28}
//! ```

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::RngCore;
use sha3::{Digest, Keccak256};

use cloak_primitives::{AssetId, EthAddress, NoteValue, TxHash};

use super::JoinSplitError;

const ETH_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";
const SIGNATURE_LEN: usize = 65;

/// Signs deposit approvals on behalf of the depositing L1 address.
#[async_trait]
pub trait EthSigner: Send + Sync {
    async fn get_address(&self) -> Result<EthAddress>;
    /// Signs `digest` as an Ethereum personal message. Returns `r | s | v`.
    async fn sign_message(&self, digest: &[u8; 32]) -> Result<Vec<u8>>;
}

pub fn deposit_signing_digest(
    public_input: &NoteValue,
    asset_id: AssetId,
    input_owner: &EthAddress,
    tx_hash: &TxHash,
) -> [u8; 32] {
    let mut asset_word = [0u8; 32];
    asset_word[28..].copy_from_slice(&asset_id.to_be_bytes());

    let mut hasher = Keccak256::new();
    hasher.update(public_input.to_be_bytes());
    hasher.update(asset_word);
    hasher.update(input_owner.to_word());
    hasher.update(tx_hash.as_bytes());
    hasher.finalize().into()
}

pub fn eth_message_hash(digest: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(ETH_MESSAGE_PREFIX);
    hasher.update(digest);
    hasher.finalize().into()
}

/// Rewrites a trailing recovery id of 0/1 to 27/28.
pub fn normalize_recovery_byte(mut signature: Vec<u8>) -> Result<Vec<u8>, JoinSplitError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(JoinSplitError::InvalidSignature(signature.len()));
    }
    match signature[64] {
        0 | 1 => signature[64] += 27,
        27 | 28 => {}
        _ => return Err(JoinSplitError::InvalidSignature(signature.len())),
    }
    Ok(signature)
}

pub fn address_of(key: &VerifyingKey) -> EthAddress {
    let encoded = key.to_encoded_point(false);
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    EthAddress(address)
}

/// Recovers the signing address of a personal-message signature.
pub fn recover_address(digest: &[u8; 32], signature: &[u8]) -> Result<EthAddress> {
    if signature.len() != SIGNATURE_LEN {
        anyhow::bail!("signature must be {SIGNATURE_LEN} bytes, got {}", signature.len());
    }
    let sig = Signature::from_slice(&signature[..64]).context("malformed signature")?;
    let v = match signature[64] {
        v @ (27 | 28) => v - 27,
        v => v,
    };
    let recid = RecoveryId::from_byte(v).context("invalid recovery id")?;
    let key = VerifyingKey::recover_from_prehash(&eth_message_hash(digest), &sig, recid)
        .map_err(|e| anyhow!("recovery failed: {e}"))?;
    Ok(address_of(&key))
}

/// A secp256k1 key held in process.
pub struct LocalEthSigner {
    key: SigningKey,
    address: EthAddress,
}

impl LocalEthSigner {
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self> {
        let key = SigningKey::from_slice(secret).map_err(|e| anyhow!("invalid secp256k1 key: {e}"))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut secret = [0u8; 32];
            rng.fill_bytes(&mut secret);
            if let Ok(signer) = Self::from_bytes(&secret) {
                return signer;
            }
        }
    }

    pub fn address(&self) -> EthAddress {
        self.address
    }
}

#[async_trait]
impl EthSigner for LocalEthSigner {
    async fn get_address(&self) -> Result<EthAddress> {
        Ok(self.address)
    }

    async fn sign_message(&self, digest: &[u8; 32]) -> Result<Vec<u8>> {
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(&eth_message_hash(digest))
            .map_err(|e| anyhow!("signing failed: {e}"))?;
        let mut out = sig.to_bytes().to_vec();
        out.push(recid.to_byte());
        Ok(out)
    }
}
