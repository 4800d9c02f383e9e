use chrono::{DateTime, Utc};
use serde::Serialize;

use cloak_primitives::{AccountId, AccountPublicKey, AliasHash, AssetId, EthAddress, NoteValue, TxHash};
use cloak_privacy::{Nullifier, TreeNote, UserKeys};

/// A note owned by a local user, placed in the data tree at `index`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub index: u64,
    pub owner: AccountId,
    pub value: NoteValue,
    pub asset_id: AssetId,
    #[serde(with = "hex::serde")]
    pub secret: [u8; 32],
    pub nullifier: Nullifier,
    pub nullified: bool,
}

impl Note {
    /// The note as committed in the tree.
    pub fn tree_note(&self) -> TreeNote {
        TreeNote::with_secret(
            self.owner.public_key,
            self.value.clone(),
            self.asset_id,
            self.secret,
        )
    }
}

/// A local account and its sync position.
#[derive(Clone, PartialEq, Eq)]
pub struct UserData {
    pub id: AccountId,
    pub private_key: [u8; 32],
    /// Highest rollup applied to this user, `-1` when nothing has been seen.
    pub synced_to_rollup: i64,
}

impl UserData {
    pub fn new(keys: &UserKeys, nonce: u32) -> Self {
        Self {
            id: keys.account_id(nonce),
            private_key: *keys.private_key(),
            synced_to_rollup: -1,
        }
    }

    pub fn public_key(&self) -> AccountPublicKey {
        self.id.public_key
    }

    pub fn keys(&self) -> UserKeys {
        UserKeys::from_private_key(self.private_key)
    }
}

impl std::fmt::Debug for UserData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserData")
            .field("id", &self.id)
            .field("synced_to_rollup", &self.synced_to_rollup)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum TxAction {
    Deposit = 0,
    Transfer = 1,
    Withdraw = 2,
    Receive = 3,
    Account = 4,
}

impl TryFrom<u8> for TxAction {
    type Error = anyhow::Error;

    fn try_from(v: u8) -> anyhow::Result<Self> {
        Ok(match v {
            0 => Self::Deposit,
            1 => Self::Transfer,
            2 => Self::Withdraw,
            3 => Self::Receive,
            4 => Self::Account,
            other => anyhow::bail!("unknown tx action {other}"),
        })
    }
}

/// One transaction as seen by one user. `(tx_hash, user_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserTx {
    pub tx_hash: TxHash,
    pub user_id: AccountId,
    pub action: TxAction,
    pub asset_id: AssetId,
    pub value: NoteValue,
    pub settled: bool,
    pub created: DateTime<Utc>,
    pub recipient: Option<EthAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSigningKey {
    pub account_id: AccountId,
    pub key: [u8; 32],
    pub tree_index: u64,
}

/// One generation of an alias registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub alias_hash: AliasHash,
    pub address: AccountPublicKey,
    pub latest_nonce: u32,
}

impl Alias {
    /// Key the alias is stored under; also breaks ties between generations.
    pub fn storage_key(&self) -> Vec<u8> {
        alias_key(&self.alias_hash, &self.address)
    }
}

pub(crate) fn alias_key(alias_hash: &AliasHash, address: &AccountPublicKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(AliasHash::LEN + AccountPublicKey::LEN);
    key.extend_from_slice(alias_hash.as_bytes());
    key.extend_from_slice(&address.to_bytes());
    key
}

/// Picks the generation with the greatest nonce not above `max_nonce`.
pub(crate) fn latest_generation(
    aliases: impl IntoIterator<Item = Alias>,
    max_nonce: Option<u32>,
) -> Option<Alias> {
    aliases
        .into_iter()
        .filter(|a| max_nonce.is_none_or(|max| a.latest_nonce <= max))
        .max_by(|a, b| {
            a.latest_nonce
                .cmp(&b.latest_nonce)
                .then_with(|| a.storage_key().cmp(&b.storage_key()))
        })
}
