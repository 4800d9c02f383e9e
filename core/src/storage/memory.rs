use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cloak_primitives::{AccountId, AccountPublicKey, AliasHash, TxHash};
use cloak_privacy::Nullifier;

use super::state::WalletDb;
use super::types::{Alias, Note, UserData, UserSigningKey, UserTx};

#[derive(Default)]
struct Tables {
    notes: BTreeMap<u64, Note>,
    nullifiers: HashMap<Nullifier, u64>,
    users: BTreeMap<AccountId, UserData>,
    user_txs: BTreeMap<(TxHash, AccountId), UserTx>,
    signing_keys: BTreeMap<(AccountId, [u8; 32]), u64>,
    aliases: BTreeMap<(AliasHash, AccountPublicKey), u32>,
    key_values: BTreeMap<String, Vec<u8>>,
}

impl Tables {
    fn remove_notes_where(&mut self, pred: impl Fn(&Note) -> bool) {
        let doomed: Vec<Note> = self.notes.values().filter(|n| pred(n)).cloned().collect();
        for note in doomed {
            self.notes.remove(&note.index);
            self.nullifiers.remove(&note.nullifier);
        }
    }
}

/// In-process wallet store, for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

fn to_alias(((alias_hash, address), nonce): (&(AliasHash, AccountPublicKey), &u32)) -> Alias {
    Alias {
        alias_hash: *alias_hash,
        address: *address,
        latest_nonce: *nonce,
    }
}

impl WalletDb for MemoryStore {
    fn add_note(&self, note: &Note) -> Result<()> {
        let mut t = self.write()?;
        if let Some(old) = t.notes.insert(note.index, note.clone()) {
            t.nullifiers.remove(&old.nullifier);
        }
        t.nullifiers.insert(note.nullifier, note.index);
        Ok(())
    }

    fn get_note(&self, index: u64) -> Result<Option<Note>> {
        Ok(self.read()?.notes.get(&index).cloned())
    }

    fn get_note_by_nullifier(&self, nullifier: &Nullifier) -> Result<Option<Note>> {
        let t = self.read()?;
        Ok(t.nullifiers
            .get(nullifier)
            .and_then(|index| t.notes.get(index))
            .cloned())
    }

    fn nullify_note(&self, index: u64) -> Result<()> {
        if let Some(note) = self.write()?.notes.get_mut(&index) {
            note.nullified = true;
        }
        Ok(())
    }

    fn get_user_notes(&self, owner: &AccountId) -> Result<Vec<Note>> {
        Ok(self
            .read()?
            .notes
            .values()
            .filter(|n| n.owner == *owner && !n.nullified)
            .cloned()
            .collect())
    }

    fn add_user(&self, user: &UserData) -> Result<()> {
        self.write()?.users.insert(user.id, user.clone());
        Ok(())
    }

    fn get_user(&self, id: &AccountId) -> Result<Option<UserData>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    fn get_users(&self) -> Result<Vec<UserData>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    fn update_user(&self, user: &UserData) -> Result<()> {
        if let Some(existing) = self.write()?.users.get_mut(&user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    fn remove_user(&self, id: &AccountId) -> Result<()> {
        let mut t = self.write()?;
        t.users.remove(id);
        t.remove_notes_where(|n| n.owner == *id);
        t.signing_keys.retain(|(account, _), _| account != id);
        t.user_txs.retain(|(_, user), _| user != id);
        Ok(())
    }

    fn add_user_tx(&self, tx: &UserTx) -> Result<()> {
        self.write()?
            .user_txs
            .insert((tx.tx_hash, tx.user_id), tx.clone());
        Ok(())
    }

    fn get_user_tx(&self, user_id: &AccountId, tx_hash: &TxHash) -> Result<Option<UserTx>> {
        Ok(self.read()?.user_txs.get(&(*tx_hash, *user_id)).cloned())
    }

    fn get_user_txs(&self, user_id: &AccountId) -> Result<Vec<UserTx>> {
        let mut txs: Vec<UserTx> = self
            .read()?
            .user_txs
            .values()
            .filter(|tx| tx.user_id == *user_id)
            .cloned()
            .collect();
        txs.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(txs)
    }

    fn settle_user_tx(&self, user_id: &AccountId, tx_hash: &TxHash) -> Result<()> {
        if let Some(tx) = self.write()?.user_txs.get_mut(&(*tx_hash, *user_id)) {
            tx.settled = true;
        }
        Ok(())
    }

    fn add_user_signing_key(&self, key: &UserSigningKey) -> Result<()> {
        self.write()?
            .signing_keys
            .insert((key.account_id, key.key), key.tree_index);
        Ok(())
    }

    fn get_user_signing_keys(&self, account_id: &AccountId) -> Result<Vec<UserSigningKey>> {
        Ok(self
            .read()?
            .signing_keys
            .iter()
            .filter(|((account, _), _)| account == account_id)
            .map(|((account, key), index)| UserSigningKey {
                account_id: *account,
                key: *key,
                tree_index: *index,
            })
            .collect())
    }

    fn get_user_signing_key_index(
        &self,
        account_id: &AccountId,
        key: &[u8; 32],
    ) -> Result<Option<u64>> {
        Ok(self
            .read()?
            .signing_keys
            .get(&(*account_id, *key))
            .copied())
    }

    fn remove_user_signing_keys(&self, account_id: &AccountId) -> Result<()> {
        self.write()?
            .signing_keys
            .retain(|(account, _), _| account != account_id);
        Ok(())
    }

    fn add_alias(&self, alias: &Alias) -> Result<()> {
        self.write()?
            .aliases
            .insert((alias.alias_hash, alias.address), alias.latest_nonce);
        Ok(())
    }

    fn get_alias(
        &self,
        alias_hash: &AliasHash,
        address: &AccountPublicKey,
    ) -> Result<Option<Alias>> {
        Ok(self
            .read()?
            .aliases
            .get_key_value(&(*alias_hash, *address))
            .map(to_alias))
    }

    fn get_aliases(&self, alias_hash: &AliasHash) -> Result<Vec<Alias>> {
        Ok(self
            .read()?
            .aliases
            .iter()
            .filter(|((hash, _), _)| hash == alias_hash)
            .map(to_alias)
            .collect())
    }

    fn get_aliases_by_address(&self, address: &AccountPublicKey) -> Result<Vec<Alias>> {
        Ok(self
            .read()?
            .aliases
            .iter()
            .filter(|((_, addr), _)| addr == address)
            .map(to_alias)
            .collect())
    }

    fn add_key(&self, name: &str, value: &[u8]) -> Result<()> {
        self.write()?
            .key_values
            .insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn get_key(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.key_values.get(name).cloned())
    }

    fn delete_key(&self, name: &str) -> Result<()> {
        self.write()?.key_values.remove(name);
        Ok(())
    }

    fn reset_users(&self) -> Result<()> {
        let mut t = self.write()?;
        t.aliases.clear();
        t.notes.clear();
        t.nullifiers.clear();
        t.signing_keys.clear();
        t.user_txs.clear();
        for user in t.users.values_mut() {
            user.synced_to_rollup = -1;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.write()? = Tables::default();
        Ok(())
    }
}
