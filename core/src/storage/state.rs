use anyhow::Result;

use cloak_primitives::{AccountId, AccountPublicKey, AliasHash, TxHash};
use cloak_privacy::Nullifier;

use super::types::{Alias, Note, UserData, UserSigningKey, UserTx};

/// Decouples wallet logic from the backing store.
///
/// Every method takes `&self`; implementations serialize their own writes.
/// Lookups of missing rows return `None` and mutations of missing rows are
/// no-ops.
pub trait WalletDb: Send + Sync {
    // ---- notes -------------------------------------------------------------

    /// Insert or replace the note at `note.index`.
    fn add_note(&self, note: &Note) -> Result<()>;
    fn get_note(&self, index: u64) -> Result<Option<Note>>;
    fn get_note_by_nullifier(&self, nullifier: &Nullifier) -> Result<Option<Note>>;
    fn nullify_note(&self, index: u64) -> Result<()>;
    /// Unspent notes of `owner`, ascending by index.
    fn get_user_notes(&self, owner: &AccountId) -> Result<Vec<Note>>;

    // ---- users -------------------------------------------------------------

    fn add_user(&self, user: &UserData) -> Result<()>;
    fn get_user(&self, id: &AccountId) -> Result<Option<UserData>>;
    fn get_users(&self) -> Result<Vec<UserData>>;
    fn update_user(&self, user: &UserData) -> Result<()>;
    /// Delete the user together with its notes, signing keys and history.
    fn remove_user(&self, id: &AccountId) -> Result<()>;

    // ---- transaction history ----------------------------------------------

    /// Insert or overwrite the row keyed by `(tx.tx_hash, tx.user_id)`.
    fn add_user_tx(&self, tx: &UserTx) -> Result<()>;
    fn get_user_tx(&self, user_id: &AccountId, tx_hash: &TxHash) -> Result<Option<UserTx>>;
    /// Newest first.
    fn get_user_txs(&self, user_id: &AccountId) -> Result<Vec<UserTx>>;
    fn is_user_tx_present(&self, user_id: &AccountId, tx_hash: &TxHash) -> Result<bool> {
        Ok(self.get_user_tx(user_id, tx_hash)?.is_some())
    }
    fn settle_user_tx(&self, user_id: &AccountId, tx_hash: &TxHash) -> Result<()>;

    // ---- signing keys -----------------------------------------------------

    fn add_user_signing_key(&self, key: &UserSigningKey) -> Result<()>;
    fn get_user_signing_keys(&self, account_id: &AccountId) -> Result<Vec<UserSigningKey>>;
    fn get_user_signing_key_index(
        &self,
        account_id: &AccountId,
        key: &[u8; 32],
    ) -> Result<Option<u64>>;
    fn remove_user_signing_keys(&self, account_id: &AccountId) -> Result<()>;

    // ---- aliases ----------------------------------------------------------

    fn add_alias(&self, alias: &Alias) -> Result<()>;
    /// Replaces the `(alias_hash, address)` row, inserting a new generation
    /// when there is none.
    fn update_alias(&self, alias: &Alias) -> Result<()> {
        self.add_alias(alias)
    }
    fn get_alias(&self, alias_hash: &AliasHash, address: &AccountPublicKey)
    -> Result<Option<Alias>>;
    fn get_aliases(&self, alias_hash: &AliasHash) -> Result<Vec<Alias>>;
    fn get_aliases_by_address(&self, address: &AccountPublicKey) -> Result<Vec<Alias>>;

    fn get_latest_nonce_by_address(&self, address: &AccountPublicKey) -> Result<Option<u32>> {
        Ok(super::types::latest_generation(self.get_aliases_by_address(address)?, None)
            .map(|a| a.latest_nonce))
    }

    fn get_latest_nonce_by_alias_hash(&self, alias_hash: &AliasHash) -> Result<Option<u32>> {
        Ok(super::types::latest_generation(self.get_aliases(alias_hash)?, None)
            .map(|a| a.latest_nonce))
    }

    fn get_alias_hash_by_address(
        &self,
        address: &AccountPublicKey,
        max_nonce: Option<u32>,
    ) -> Result<Option<AliasHash>> {
        Ok(
            super::types::latest_generation(self.get_aliases_by_address(address)?, max_nonce)
                .map(|a| a.alias_hash),
        )
    }

    fn get_address_by_alias_hash(
        &self,
        alias_hash: &AliasHash,
        max_nonce: Option<u32>,
    ) -> Result<Option<AccountPublicKey>> {
        Ok(
            super::types::latest_generation(self.get_aliases(alias_hash)?, max_nonce)
                .map(|a| a.address),
        )
    }

    // ---- key/value blobs --------------------------------------------------

    fn add_key(&self, name: &str, value: &[u8]) -> Result<()>;
    fn get_key(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn delete_key(&self, name: &str) -> Result<()>;

    // ---- lifecycle --------------------------------------------------------

    /// Drop aliases, notes, signing keys and history, and rewind every user
    /// to `synced_to_rollup = -1`. Users and key/value blobs survive.
    fn reset_users(&self) -> Result<()>;
    /// Drop everything.
    fn clear(&self) -> Result<()>;
}
