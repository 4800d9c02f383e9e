//! Engine lifecycle: one explicit store handle, opened by `init` and
//! released by `destroy`.

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use cloak_config::{CloakConfig, StoreBackend};
use cloak_primitives::{AccountId, AssetId, NoteValue};
use cloak_privacy::UserKeys;

use crate::chain::{RollupChain, RollupDecoder};
use crate::joinsplit::{JoinSplitProofOutput, JoinSplitProver, JoinSplitTxBuilder, WorldState};
use crate::note_picker::NotePicker;
use crate::storage::{MemoryStore, Note, RocksDbStore, TxAction, UserData, UserTx, WalletDb};
use crate::sync::RollupSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitAction {
    OpeningStore,
    LoadingUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitState {
    #[default]
    Uninitialized,
    Initializing(InitAction),
    Initialized,
}

pub struct CoreEngine {
    config: CloakConfig,
    state: RwLock<InitState>,
    db: RwLock<Option<Arc<dyn WalletDb>>>,
}

impl CoreEngine {
    pub fn new(config: CloakConfig) -> Self {
        Self {
            config,
            state: RwLock::new(InitState::Uninitialized),
            db: RwLock::new(None),
        }
    }

    /// Starts from an already opened store, skipping `init`.
    pub fn with_store(config: CloakConfig, db: Arc<dyn WalletDb>) -> Self {
        Self {
            config,
            state: RwLock::new(InitState::Initialized),
            db: RwLock::new(Some(db)),
        }
    }

    pub fn config(&self) -> &CloakConfig {
        &self.config
    }

    pub fn status(&self) -> Result<InitState> {
        self.state
            .read()
            .map(|s| *s)
            .map_err(|_| anyhow!("engine state lock poisoned"))
    }

    pub async fn init(&self) -> Result<()> {
        {
            let mut state = self.write_state()?;
            if *state != InitState::Uninitialized {
                bail!("engine init called while {:?}", *state);
            }
            *state = InitState::Initializing(InitAction::OpeningStore);
        }

        match self.open_and_load().await {
            Ok(db) => {
                *self.write_db()? = Some(db);
                *self.write_state()? = InitState::Initialized;
                Ok(())
            }
            Err(e) => {
                warn!("engine init failed: {e:#}");
                *self.write_state()? = InitState::Uninitialized;
                Err(e)
            }
        }
    }

    async fn open_and_load(&self) -> Result<Arc<dyn WalletDb>> {
        let db: Arc<dyn WalletDb> = match self.config.database.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Rocksdb => {
                let path = self.config.database.path.clone();
                let store = tokio::task::spawn_blocking(move || RocksDbStore::open(&path))
                    .await
                    .context("store open task panicked")?
                    .with_context(|| format!("opening {}", self.config.database.path))?;
                Arc::new(store)
            }
        };

        *self.write_state()? = InitState::Initializing(InitAction::LoadingUsers);
        let users = db.get_users()?;
        info!(
            "engine ready: {:?} store, {} user(s)",
            self.config.database.backend,
            users.len()
        );
        for user in &users {
            debug!("user {} synced to rollup {}", user.id, user.synced_to_rollup);
        }
        Ok(db)
    }

    /// The open store.
    pub fn db(&self) -> Result<Arc<dyn WalletDb>> {
        self.db
            .read()
            .map_err(|_| anyhow!("engine lock poisoned"))?
            .clone()
            .ok_or_else(|| anyhow!("engine not initialized"))
    }

    /// Registers `keys` at `nonce`. An existing user is returned unchanged.
    pub fn add_user(&self, keys: &UserKeys, nonce: u32) -> Result<UserData> {
        let db = self.db()?;
        let id = keys.account_id(nonce);
        if let Some(existing) = db.get_user(&id)? {
            return Ok(existing);
        }
        let user = UserData::new(keys, nonce);
        db.add_user(&user)?;
        info!("added user {id}");
        Ok(user)
    }

    pub fn get_users(&self) -> Result<Vec<UserData>> {
        self.db()?.get_users()
    }

    pub fn remove_user(&self, id: &AccountId) -> Result<()> {
        self.db()?.remove_user(id)
    }

    pub fn get_balance(&self, id: &AccountId, asset_id: AssetId) -> Result<NoteValue> {
        let notes = self.db()?.get_user_notes(id)?;
        NoteValue::checked_sum(notes.iter().filter(|n| n.asset_id == asset_id).map(|n| &n.value))
            .context("balance overflow")
    }

    /// Unspent notes of `asset_id` that would fund `target`.
    pub fn pick_notes(
        &self,
        id: &AccountId,
        asset_id: AssetId,
        target: &NoteValue,
    ) -> Result<Vec<Note>> {
        let notes = self.db()?.get_user_notes(id)?;
        let picker = NotePicker::new(notes.into_iter().filter(|n| n.asset_id == asset_id));
        Ok(picker.pick(target)?)
    }

    pub fn builder(
        &self,
        prover: Arc<dyn JoinSplitProver>,
        world_state: Arc<dyn WorldState>,
    ) -> JoinSplitTxBuilder {
        JoinSplitTxBuilder::new(prover, world_state)
            .with_proof_timeout(self.config.prover.proof_timeout())
    }

    /// Records a built join-split as an unsettled history row so sync can
    /// settle it when the rollup lands.
    pub fn add_pending_tx(&self, user_id: &AccountId, output: &JoinSplitProofOutput) -> Result<UserTx> {
        let tx = &output.tx;
        let (action, value) = if !tx.public_input.is_zero() {
            (TxAction::Deposit, tx.public_input.clone())
        } else if !tx.public_output.is_zero() {
            (TxAction::Withdraw, tx.public_output.clone())
        } else {
            (TxAction::Transfer, tx.output_notes[0].value.clone())
        };
        let user_tx = UserTx {
            tx_hash: output.tx_hash,
            user_id: *user_id,
            action,
            asset_id: tx.asset_id,
            value,
            settled: false,
            created: chrono::Utc::now(),
            recipient: (!tx.output_owner.is_zero()).then_some(tx.output_owner),
        };
        self.db()?.add_user_tx(&user_tx)?;
        Ok(user_tx)
    }

    pub fn sync(&self, chain: Arc<dyn RollupChain>) -> Result<RollupSync> {
        Ok(RollupSync::new(
            self.db()?,
            RollupDecoder::new(chain),
            &self.config,
        ))
    }

    /// Forgets everything learned from the chain, keeping users and blobs.
    pub fn reset(&self) -> Result<()> {
        self.db()?.reset_users()?;
        info!("engine reset");
        Ok(())
    }

    /// Releases the store. The engine can be initialised again afterwards.
    pub fn destroy(&self) -> Result<()> {
        let released = self.write_db()?.take();
        *self.write_state()? = InitState::Uninitialized;
        if released.is_some() {
            info!("engine destroyed");
        }
        Ok(())
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, InitState>> {
        self.state
            .write()
            .map_err(|_| anyhow!("engine lock poisoned"))
    }

    fn write_db(&self) -> Result<RwLockWriteGuard<'_, Option<Arc<dyn WalletDb>>>> {
        self.db.write().map_err(|_| anyhow!("engine lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poisoned_state_is_reported() {
        let engine = CoreEngine::new(CloakConfig::default());
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _state = engine.state.write().unwrap();
                    panic!("writer died holding the state lock");
                })
                .join();
        });
        assert!(engine.status().is_err());
    }
}
