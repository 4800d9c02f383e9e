//! On-disk value encodings for [`RocksDbStore`](super::RocksDbStore).
//!
//! Keys carry the identifying fields, values carry the rest.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use wincode::{SchemaRead, SchemaWrite};

use cloak_primitives::{AccountId, AccountPublicKey, EthAddress, NoteValue, TxHash};
use cloak_privacy::Nullifier;

use super::types::{Note, TxAction, UserData, UserTx};

#[derive(Debug, SchemaRead, SchemaWrite)]
pub(crate) struct NoteRecord {
    pub owner_signer: [u8; 32],
    pub owner_privacy: [u8; 32],
    pub owner_nonce: u32,
    pub value: [u8; 32],
    pub asset_id: u32,
    pub secret: [u8; 32],
    pub nullifier: [u8; 32],
    pub nullified: bool,
}

impl NoteRecord {
    pub fn from_note(note: &Note) -> Self {
        Self {
            owner_signer: note.owner.public_key.signer,
            owner_privacy: note.owner.public_key.privacy,
            owner_nonce: note.owner.nonce,
            value: note.value.to_be_bytes(),
            asset_id: note.asset_id,
            secret: note.secret,
            nullifier: *note.nullifier.as_bytes(),
            nullified: note.nullified,
        }
    }

    pub fn into_note(self, index: u64) -> Note {
        Note {
            index,
            owner: AccountId::new(
                AccountPublicKey::new(self.owner_signer, self.owner_privacy),
                self.owner_nonce,
            ),
            value: NoteValue::from_be_bytes(&self.value),
            asset_id: self.asset_id,
            secret: self.secret,
            nullifier: Nullifier::from_bytes(self.nullifier),
            nullified: self.nullified,
        }
    }
}

#[derive(Debug, SchemaRead, SchemaWrite)]
pub(crate) struct UserRecord {
    pub private_key: [u8; 32],
    pub synced_to_rollup: i64,
}

impl UserRecord {
    pub fn from_user(user: &UserData) -> Self {
        Self {
            private_key: user.private_key,
            synced_to_rollup: user.synced_to_rollup,
        }
    }

    pub fn into_user(self, id: AccountId) -> UserData {
        UserData {
            id,
            private_key: self.private_key,
            synced_to_rollup: self.synced_to_rollup,
        }
    }
}

#[derive(Debug, SchemaRead, SchemaWrite)]
pub(crate) struct UserTxRecord {
    pub action: u8,
    pub asset_id: u32,
    pub value: [u8; 32],
    pub settled: bool,
    pub created_ms: i64,
    pub recipient: Option<[u8; 20]>,
}

impl UserTxRecord {
    pub fn from_tx(tx: &UserTx) -> Self {
        Self {
            action: tx.action as u8,
            asset_id: tx.asset_id,
            value: tx.value.to_be_bytes(),
            settled: tx.settled,
            created_ms: tx.created.timestamp_millis(),
            recipient: tx.recipient.map(|r| r.0),
        }
    }

    pub fn into_tx(self, tx_hash: TxHash, user_id: AccountId) -> Result<UserTx> {
        Ok(UserTx {
            tx_hash,
            user_id,
            action: TxAction::try_from(self.action)?,
            asset_id: self.asset_id,
            value: NoteValue::from_be_bytes(&self.value),
            settled: self.settled,
            created: DateTime::<Utc>::from_timestamp_millis(self.created_ms)
                .context("user tx timestamp out of range")?,
            recipient: self.recipient.map(EthAddress),
        })
    }
}
