use anyhow::{Context, Result, anyhow};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use cloak_primitives::{AccountId, AccountPublicKey, AliasHash, TxHash};
use cloak_privacy::Nullifier;

use super::records::{NoteRecord, UserRecord, UserTxRecord};
use super::state::WalletDb;
use super::types::{Alias, Note, UserData, UserSigningKey, UserTx, alias_key};

const CF_USERS: &str = "users";
const CF_USER_TXS: &str = "user_txs";
const CF_NOTES: &str = "notes";
const CF_NOTE_NULLIFIERS: &str = "note_nullifiers";
const CF_SIGNING_KEYS: &str = "signing_keys";
const CF_ALIASES: &str = "aliases";
const CF_KEY_VALUES: &str = "key_values";

const ALL_CFS: [&str; 7] = [
    CF_USERS,
    CF_USER_TXS,
    CF_NOTES,
    CF_NOTE_NULLIFIERS,
    CF_SIGNING_KEYS,
    CF_ALIASES,
    CF_KEY_VALUES,
];

/// A thread-safe wallet database on RocksDB, one column family per entity.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens the database at the specified path, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let families = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, families)
            .map_err(|e| anyhow!("Failed to open RocksDB: {}", e))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .with_context(|| format!("{name} CF missing"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| anyhow!("wallet db write lock poisoned"))
    }

    /// Every `(key, value)` of a column family whose key starts with `prefix`.
    fn scan_prefix(&self, name: &'static str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(name)?;
        let mut out = Vec::new();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    fn scan_all(&self, name: &'static str) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        self.scan_prefix(name, &[])
    }

    /// Queue deletion of every key in a column family.
    fn clear_cf(&self, batch: &mut WriteBatch, name: &'static str) -> Result<()> {
        let cf = self.cf(name)?;
        for (key, _) in self.scan_all(name)? {
            batch.delete_cf(cf, key);
        }
        Ok(())
    }

    fn decode_note(key: &[u8], value: &[u8]) -> Result<Note> {
        let index = u64::from_be_bytes(key.try_into().context("invalid note key length")?);
        let record: NoteRecord = wincode::deserialize(value)?;
        Ok(record.into_note(index))
    }

    fn decode_alias(key: &[u8], value: &[u8]) -> Result<Alias> {
        if key.len() != AliasHash::LEN + AccountPublicKey::LEN {
            anyhow::bail!("invalid alias key length {}", key.len());
        }
        let (hash, address) = key.split_at(AliasHash::LEN);
        let mut alias_hash = [0u8; AliasHash::LEN];
        alias_hash.copy_from_slice(hash);
        Ok(Alias {
            alias_hash: AliasHash(alias_hash),
            address: AccountPublicKey::from_slice(address)?,
            latest_nonce: u32::from_be_bytes(
                value.try_into().context("invalid alias nonce length")?,
            ),
        })
    }

    fn decode_user_tx(key: &[u8], value: &[u8]) -> Result<UserTx> {
        if key.len() != AccountId::LEN + TxHash::LEN {
            anyhow::bail!("invalid user tx key length {}", key.len());
        }
        let (user, hash) = key.split_at(AccountId::LEN);
        let record: UserTxRecord = wincode::deserialize(value)?;
        record.into_tx(TxHash::from_slice(hash)?, AccountId::from_slice(user)?)
    }

    /// Queue removal of a note and its nullifier index entry.
    fn delete_note(&self, batch: &mut WriteBatch, note: &Note) -> Result<()> {
        batch.delete_cf(self.cf(CF_NOTES)?, note.index.to_be_bytes());
        batch.delete_cf(self.cf(CF_NOTE_NULLIFIERS)?, note.nullifier.as_bytes());
        Ok(())
    }

    fn user_txs_of(&self, user_id: &AccountId) -> Result<Vec<UserTx>> {
        self.scan_prefix(CF_USER_TXS, &user_id.to_bytes())?
            .iter()
            .map(|(key, value)| Self::decode_user_tx(key, value))
            .collect()
    }

    fn put_user_tx(&self, tx: &UserTx) -> Result<()> {
        let value = wincode::serialize(&UserTxRecord::from_tx(tx))?;
        self.db
            .put_cf(self.cf(CF_USER_TXS)?, user_tx_key(&tx.user_id, &tx.tx_hash), value)?;
        Ok(())
    }
}

fn user_tx_key(user_id: &AccountId, tx_hash: &TxHash) -> Vec<u8> {
    let mut key = Vec::with_capacity(AccountId::LEN + TxHash::LEN);
    key.extend_from_slice(&user_id.to_bytes());
    key.extend_from_slice(tx_hash.as_bytes());
    key
}

fn signing_key_key(account_id: &AccountId, key: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(AccountId::LEN + 32);
    out.extend_from_slice(&account_id.to_bytes());
    out.extend_from_slice(key);
    out
}

impl WalletDb for RocksDbStore {
    fn add_note(&self, note: &Note) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();

        if let Some(old) = self.get_note(note.index)? {
            batch.delete_cf(self.cf(CF_NOTE_NULLIFIERS)?, old.nullifier.as_bytes());
        }
        batch.put_cf(
            self.cf(CF_NOTES)?,
            note.index.to_be_bytes(),
            wincode::serialize(&NoteRecord::from_note(note))?,
        );
        batch.put_cf(
            self.cf(CF_NOTE_NULLIFIERS)?,
            note.nullifier.as_bytes(),
            note.index.to_be_bytes(),
        );

        self.db.write(batch)?;
        Ok(())
    }

    fn get_note(&self, index: u64) -> Result<Option<Note>> {
        let key = index.to_be_bytes();
        match self.db.get_cf(self.cf(CF_NOTES)?, key)? {
            Some(bytes) => Ok(Some(Self::decode_note(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn get_note_by_nullifier(&self, nullifier: &Nullifier) -> Result<Option<Note>> {
        match self
            .db
            .get_cf(self.cf(CF_NOTE_NULLIFIERS)?, nullifier.as_bytes())?
        {
            Some(bytes) => {
                let index = u64::from_be_bytes(
                    bytes
                        .as_slice()
                        .try_into()
                        .context("invalid nullifier index length")?,
                );
                self.get_note(index)
            }
            None => Ok(None),
        }
    }

    fn nullify_note(&self, index: u64) -> Result<()> {
        let _guard = self.lock()?;
        let Some(mut note) = self.get_note(index)? else {
            return Ok(());
        };
        note.nullified = true;
        self.db.put_cf(
            self.cf(CF_NOTES)?,
            index.to_be_bytes(),
            wincode::serialize(&NoteRecord::from_note(&note))?,
        )?;
        Ok(())
    }

    fn get_user_notes(&self, owner: &AccountId) -> Result<Vec<Note>> {
        let mut notes = Vec::new();
        for (key, value) in self.scan_all(CF_NOTES)? {
            let note = Self::decode_note(&key, &value)?;
            if note.owner == *owner && !note.nullified {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    fn add_user(&self, user: &UserData) -> Result<()> {
        let _guard = self.lock()?;
        self.db.put_cf(
            self.cf(CF_USERS)?,
            user.id.to_bytes(),
            wincode::serialize(&UserRecord::from_user(user))?,
        )?;
        Ok(())
    }

    fn get_user(&self, id: &AccountId) -> Result<Option<UserData>> {
        match self.db.get_cf(self.cf(CF_USERS)?, id.to_bytes())? {
            Some(bytes) => {
                let record: UserRecord = wincode::deserialize(&bytes)?;
                Ok(Some(record.into_user(*id)))
            }
            None => Ok(None),
        }
    }

    fn get_users(&self) -> Result<Vec<UserData>> {
        self.scan_all(CF_USERS)?
            .into_iter()
            .map(|(key, value)| {
                let record: UserRecord = wincode::deserialize(&value)?;
                Ok(record.into_user(AccountId::from_slice(&key)?))
            })
            .collect()
    }

    fn update_user(&self, user: &UserData) -> Result<()> {
        let _guard = self.lock()?;
        let cf = self.cf(CF_USERS)?;
        if self.db.get_cf(cf, user.id.to_bytes())?.is_none() {
            return Ok(());
        }
        self.db.put_cf(
            cf,
            user.id.to_bytes(),
            wincode::serialize(&UserRecord::from_user(user))?,
        )?;
        Ok(())
    }

    fn remove_user(&self, id: &AccountId) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();

        batch.delete_cf(self.cf(CF_USERS)?, id.to_bytes());

        for (key, value) in self.scan_all(CF_NOTES)? {
            let note = Self::decode_note(&key, &value)?;
            if note.owner == *id {
                self.delete_note(&mut batch, &note)?;
            }
        }

        let cf_keys = self.cf(CF_SIGNING_KEYS)?;
        for (key, _) in self.scan_prefix(CF_SIGNING_KEYS, &id.to_bytes())? {
            batch.delete_cf(cf_keys, key);
        }

        let cf_txs = self.cf(CF_USER_TXS)?;
        for tx in self.user_txs_of(id)? {
            batch.delete_cf(cf_txs, user_tx_key(&tx.user_id, &tx.tx_hash));
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn add_user_tx(&self, tx: &UserTx) -> Result<()> {
        let _guard = self.lock()?;
        self.put_user_tx(tx)
    }

    fn get_user_tx(&self, user_id: &AccountId, tx_hash: &TxHash) -> Result<Option<UserTx>> {
        let key = user_tx_key(user_id, tx_hash);
        match self.db.get_cf(self.cf(CF_USER_TXS)?, &key)? {
            Some(bytes) => Ok(Some(Self::decode_user_tx(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn get_user_txs(&self, user_id: &AccountId) -> Result<Vec<UserTx>> {
        let mut txs = self.user_txs_of(user_id)?;
        txs.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(txs)
    }

    fn settle_user_tx(&self, user_id: &AccountId, tx_hash: &TxHash) -> Result<()> {
        let _guard = self.lock()?;
        if let Some(mut tx) = self.get_user_tx(user_id, tx_hash)? {
            tx.settled = true;
            self.put_user_tx(&tx)?;
        }
        Ok(())
    }

    fn add_user_signing_key(&self, key: &UserSigningKey) -> Result<()> {
        let _guard = self.lock()?;
        self.db.put_cf(
            self.cf(CF_SIGNING_KEYS)?,
            signing_key_key(&key.account_id, &key.key),
            key.tree_index.to_be_bytes(),
        )?;
        Ok(())
    }

    fn get_user_signing_keys(&self, account_id: &AccountId) -> Result<Vec<UserSigningKey>> {
        self.scan_prefix(CF_SIGNING_KEYS, &account_id.to_bytes())?
            .into_iter()
            .map(|(key, value)| {
                let key_bytes: [u8; 32] = key[AccountId::LEN..]
                    .try_into()
                    .context("invalid signing key length")?;
                Ok(UserSigningKey {
                    account_id: *account_id,
                    key: key_bytes,
                    tree_index: u64::from_be_bytes(
                        value.as_ref().try_into().context("invalid tree index length")?,
                    ),
                })
            })
            .collect()
    }

    fn get_user_signing_key_index(
        &self,
        account_id: &AccountId,
        key: &[u8; 32],
    ) -> Result<Option<u64>> {
        match self
            .db
            .get_cf(self.cf(CF_SIGNING_KEYS)?, signing_key_key(account_id, key))?
        {
            Some(bytes) => Ok(Some(u64::from_be_bytes(
                bytes
                    .as_slice()
                    .try_into()
                    .context("invalid tree index length")?,
            ))),
            None => Ok(None),
        }
    }

    fn remove_user_signing_keys(&self, account_id: &AccountId) -> Result<()> {
        let _guard = self.lock()?;
        let cf = self.cf(CF_SIGNING_KEYS)?;
        let mut batch = WriteBatch::default();
        for (key, _) in self.scan_prefix(CF_SIGNING_KEYS, &account_id.to_bytes())? {
            batch.delete_cf(cf, key);
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn add_alias(&self, alias: &Alias) -> Result<()> {
        let _guard = self.lock()?;
        self.db.put_cf(
            self.cf(CF_ALIASES)?,
            alias.storage_key(),
            alias.latest_nonce.to_be_bytes(),
        )?;
        Ok(())
    }

    fn get_alias(
        &self,
        alias_hash: &AliasHash,
        address: &AccountPublicKey,
    ) -> Result<Option<Alias>> {
        let key = alias_key(alias_hash, address);
        match self.db.get_cf(self.cf(CF_ALIASES)?, &key)? {
            Some(bytes) => Ok(Some(Self::decode_alias(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn get_aliases(&self, alias_hash: &AliasHash) -> Result<Vec<Alias>> {
        self.scan_prefix(CF_ALIASES, alias_hash.as_bytes())?
            .into_iter()
            .map(|(key, value)| Self::decode_alias(&key, &value))
            .collect()
    }

    fn get_aliases_by_address(&self, address: &AccountPublicKey) -> Result<Vec<Alias>> {
        let mut out = Vec::new();
        for (key, value) in self.scan_all(CF_ALIASES)? {
            let alias = Self::decode_alias(&key, &value)?;
            if alias.address == *address {
                out.push(alias);
            }
        }
        Ok(out)
    }

    fn add_key(&self, name: &str, value: &[u8]) -> Result<()> {
        let _guard = self.lock()?;
        self.db
            .put_cf(self.cf(CF_KEY_VALUES)?, name.as_bytes(), value)?;
        Ok(())
    }

    fn get_key(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf(CF_KEY_VALUES)?, name.as_bytes())?)
    }

    fn delete_key(&self, name: &str) -> Result<()> {
        let _guard = self.lock()?;
        self.db
            .delete_cf(self.cf(CF_KEY_VALUES)?, name.as_bytes())?;
        Ok(())
    }

    fn reset_users(&self) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();

        for name in [
            CF_ALIASES,
            CF_NOTES,
            CF_NOTE_NULLIFIERS,
            CF_SIGNING_KEYS,
            CF_USER_TXS,
        ] {
            self.clear_cf(&mut batch, name)?;
        }

        let cf_users = self.cf(CF_USERS)?;
        for mut user in self.get_users()? {
            user.synced_to_rollup = -1;
            batch.put_cf(
                cf_users,
                user.id.to_bytes(),
                wincode::serialize(&UserRecord::from_user(&user))?,
            );
        }

        self.db.write(batch)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock()?;
        let mut batch = WriteBatch::default();
        for name in ALL_CFS {
            self.clear_cf(&mut batch, name)?;
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_tx_rows_group_by_user() {
        let user = AccountId::from_slice(&[4u8; AccountId::LEN]).unwrap();
        let key = user_tx_key(&user, &TxHash([9u8; 32]));
        assert!(key.starts_with(&user.to_bytes()));
        assert_eq!(&key[AccountId::LEN..], &[9u8; 32]);
    }
}
