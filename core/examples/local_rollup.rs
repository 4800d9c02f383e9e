//! Deposit, transfer and sync against an in-process rollup.
//!
//! ```text
//! RUST_LOG=debug cargo run -p cloak-core --example local_rollup
//! ```

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cloak_block::{RollupHeader, RollupProofData, decode_process_rollup};
use cloak_config::{CloakConfig, StoreBackend};
use cloak_core::CoreEngine;
use cloak_core::chain::{
    ChainBlock, ChainEvent, ChainReceipt, ChainTransaction, EventData, EventKind, RollupChain,
};
use cloak_core::joinsplit::{
    EthSigner, JoinSplitProver, JoinSplitRequest, JoinSplitTx, LocalEthSigner, WorldState,
};
use cloak_core::storage::UserData;
use cloak_primitives::{DATA_TREE_DEPTH, HashPath, NoteValue, TxHash};
use cloak_privacy::UserKeys;

/// Proves by publishing public inputs, and mines every submission at once.
#[derive(Default)]
struct LocalRollup {
    state: Mutex<LocalState>,
}

#[derive(Default)]
struct LocalState {
    next_rollup: u32,
    next_index: u32,
    events: Vec<ChainEvent>,
    txs: HashMap<TxHash, ChainTransaction>,
    blocks: HashMap<u64, ChainBlock>,
}

impl LocalRollup {
    fn state(&self) -> Result<std::sync::MutexGuard<'_, LocalState>> {
        self.state.lock().map_err(|_| anyhow!("local rollup poisoned"))
    }
}

#[async_trait]
impl JoinSplitProver for LocalRollup {
    async fn create_join_split_proof(&self, tx: &JoinSplitTx) -> Result<Vec<u8>> {
        let mut state = self.state()?;
        let header = RollupHeader {
            rollup_id: state.next_rollup,
            rollup_size: 1,
            data_start_index: state.next_index,
            old_data_root: [0u8; 32],
            new_data_root: [0u8; 32],
            num_txs: 1,
        };
        state.next_rollup += 1;
        state.next_index += 2;
        let proof = RollupProofData {
            header,
            inner_proofs: vec![tx.inner_proof_data()],
            proof: Vec::new(),
        };
        Ok(proof.encode()?)
    }
}

#[async_trait]
impl WorldState for LocalRollup {
    async fn get_root(&self) -> Result<[u8; 32]> {
        Ok([0u8; 32])
    }

    async fn get_hash_path(&self, _index: u64) -> Result<HashPath> {
        Ok(HashPath::zeroed(DATA_TREE_DEPTH))
    }
}

#[async_trait]
impl RollupChain for LocalRollup {
    async fn query_filter(
        &self,
        kind: EventKind,
        from_block: Option<u64>,
    ) -> Result<Vec<ChainEvent>> {
        Ok(self
            .state()?
            .events
            .iter()
            .filter(|e| e.data.kind() == kind)
            .filter(|e| from_block.is_none_or(|from| e.block_number >= from))
            .cloned()
            .collect())
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<ChainTransaction>> {
        let state = self.state()?;
        let head = state.blocks.len() as u64;
        Ok(state.txs.get(hash).map(|tx| ChainTransaction {
            confirmations: head - tx.block_number + 1,
            ..tx.clone()
        }))
    }

    async fn get_transaction_receipt(&self, hash: &TxHash) -> Result<Option<ChainReceipt>> {
        Ok(self.state()?.txs.get(hash).map(|tx| ChainReceipt {
            tx_hash: tx.hash,
            gas_used: 300_000,
            status: true,
        }))
    }

    async fn get_block(&self, number: u64) -> Result<Option<ChainBlock>> {
        Ok(self.state()?.blocks.get(&number).cloned())
    }

    async fn send_transaction(&self, call_data: Vec<u8>) -> Result<TxHash> {
        let args = decode_process_rollup(&call_data)?;
        let rollup_id = RollupHeader::decode(&args.proof_data)?.rollup_id;

        let mut state = self.state()?;
        let block_number = state.blocks.len() as u64 + 1;
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&block_number.to_be_bytes());
        let tx_hash = TxHash(hash);

        state.events.push(ChainEvent {
            block_number,
            log_index: 0,
            tx_hash,
            data: EventData::RollupProcessed { rollup_id },
        });
        state.txs.insert(
            tx_hash,
            ChainTransaction {
                hash: tx_hash,
                block_number,
                confirmations: 1,
                gas_price: 1_000_000_000,
                input: call_data,
            },
        );
        state.blocks.insert(
            block_number,
            ChainBlock {
                number: block_number,
                timestamp: Utc::now(),
            },
        );
        Ok(tx_hash)
    }
}

fn print_wallet(engine: &CoreEngine, name: &str, user: &UserData) -> Result<()> {
    let db = engine.db()?;
    println!("  {name}: balance {}", engine.get_balance(&user.id, 0)?);
    for tx in db.get_user_txs(&user.id)? {
        println!(
            "    {:?} {} settled={} {}",
            tx.action, tx.value, tx.settled, tx.tx_hash
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut config = CloakConfig::default();
    config.database.backend = StoreBackend::Memory;
    config.chain.min_confirmations = 1;

    let engine = CoreEngine::new(config);
    engine.init().await?;

    let rollup = Arc::new(LocalRollup::default());
    let builder = engine.builder(rollup.clone(), rollup.clone());
    let sync = engine.sync(rollup.clone())?;

    let alice = engine.add_user(&UserKeys::random(), 0)?;
    let bob = engine.add_user(&UserKeys::random(), 0)?;
    let depositor = LocalEthSigner::random();
    println!("alice {}", alice.id);
    println!("bob   {}", bob.id);
    println!("L1    {}", depositor.address());

    // 1. Deposit 100 into alice's wallet.
    let deposit = builder
        .create_proof(
            JoinSplitRequest {
                sender: alice.clone(),
                notes: Vec::new(),
                asset_id: 0,
                public_input: NoteValue::from(100u64),
                public_output: NoteValue::zero(),
                new_note_value: NoteValue::from(100u64),
                receiver: Some(alice.public_key()),
                output_owner: None,
            },
            Some(&depositor as &dyn EthSigner),
        )
        .await?;
    engine.add_pending_tx(&alice.id, &deposit)?;
    rollup.send_transaction(deposit.to_call_data()?).await?;
    sync.sync_once().await?;

    println!("after deposit:");
    print_wallet(&engine, "alice", &alice)?;

    // 2. Alice pays bob 30.
    let notes = engine.db()?.get_user_notes(&alice.id)?;
    let alice = engine
        .db()?
        .get_user(&alice.id)?
        .context("alice disappeared")?;
    let transfer = builder
        .create_proof(
            JoinSplitRequest {
                sender: alice.clone(),
                notes,
                asset_id: 0,
                public_input: NoteValue::zero(),
                public_output: NoteValue::zero(),
                new_note_value: NoteValue::from(30u64),
                receiver: Some(bob.public_key()),
                output_owner: None,
            },
            None,
        )
        .await?;
    engine.add_pending_tx(&alice.id, &transfer)?;
    rollup.send_transaction(transfer.to_call_data()?).await?;
    sync.sync_once().await?;

    println!("after transfer:");
    print_wallet(&engine, "alice", &alice)?;
    print_wallet(&engine, "bob", &bob)?;

    engine.destroy()?;
    Ok(())
}
