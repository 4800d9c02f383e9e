//! Shared fixtures and mock collaborators.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

use cloak_block::{
    InnerProofData, ProcessRollupArgs, RollupHeader, RollupProofData, decode_process_rollup,
    encode_process_rollup,
};
use cloak_primitives::{DATA_TREE_DEPTH, HashPath, NoteValue, TxHash};
use cloak_privacy::{NullifierKey, TreeNote, UserKeys};

use crate::chain::{
    ChainBlock, ChainEvent, ChainReceipt, ChainTransaction, EventData, EventKind, RollupChain,
};
use crate::joinsplit::{JoinSplitProver, JoinSplitTx, WorldState};
use crate::storage::{Note, RocksDbStore, UserData};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// The directory must outlive the store.
pub fn temp_rocks() -> (TempDir, RocksDbStore) {
    let dir = TempDir::new().unwrap();
    let db = RocksDbStore::open(dir.path()).unwrap();
    (dir, db)
}

pub fn user(seed: u8) -> UserData {
    UserData::new(&UserKeys::from_private_key([seed; 32]), 0)
}

/// An unspent asset-0 note owned by `owner` at tree position `index`.
pub fn note(owner: &UserData, index: u64, value: u64) -> Note {
    let tree_note = TreeNote::new(owner.public_key(), NoteValue::from(value), 0);
    let nullifier = NullifierKey::from_bytes(owner.keys().privacy_secret())
        .derive_nullifier(&tree_note.commitment(), index);
    Note {
        index,
        owner: owner.id,
        value: tree_note.value,
        asset_id: 0,
        secret: tree_note.secret,
        nullifier,
        nullified: false,
    }
}

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn header(rollup_id: u32, data_start_index: u32, num_txs: u32) -> RollupHeader {
    RollupHeader {
        rollup_id,
        rollup_size: num_txs.next_power_of_two(),
        data_start_index,
        old_data_root: [1u8; 32],
        new_data_root: [2u8; 32],
        num_txs,
    }
}

/// `processRollup` call data for a rollup holding `inner_proofs`.
pub fn rollup_call_data(
    rollup_id: u32,
    data_start_index: u32,
    inner_proofs: Vec<InnerProofData>,
    viewing_keys: Vec<u8>,
) -> Vec<u8> {
    let proof = RollupProofData {
        header: header(rollup_id, data_start_index, inner_proofs.len() as u32),
        inner_proofs,
        proof: vec![0xab; 16],
    };
    encode_process_rollup(&ProcessRollupArgs {
        proof_data: proof.encode().unwrap(),
        signatures: Vec::new(),
        viewing_keys,
    })
    .unwrap()
}

// ---- prover and world state ----------------------------------------------

/// Wraps the join-split's public fields in a one-tx rollup proof.
pub struct MockProver;

#[async_trait]
impl JoinSplitProver for MockProver {
    async fn create_join_split_proof(&self, tx: &JoinSplitTx) -> Result<Vec<u8>> {
        let proof = RollupProofData {
            header: header(0, 0, 1),
            inner_proofs: vec![tx.inner_proof_data()],
            proof: vec![0xaa; 64],
        };
        Ok(proof.encode()?)
    }
}

pub struct SlowProver(pub Duration);

#[async_trait]
impl JoinSplitProver for SlowProver {
    async fn create_join_split_proof(&self, _tx: &JoinSplitTx) -> Result<Vec<u8>> {
        tokio::time::sleep(self.0).await;
        Ok(vec![0u8; 32])
    }
}

#[derive(Default)]
pub struct MockWorldState {
    pub requested_paths: Mutex<Vec<u64>>,
}

pub const MOCK_ROOT: [u8; 32] = [7u8; 32];

#[async_trait]
impl WorldState for MockWorldState {
    async fn get_root(&self) -> Result<[u8; 32]> {
        Ok(MOCK_ROOT)
    }

    async fn get_hash_path(&self, index: u64) -> Result<HashPath> {
        self.requested_paths.lock().unwrap().push(index);
        Ok(HashPath::zeroed(DATA_TREE_DEPTH))
    }
}

// ---- chain ------------------------------------------------------------------

/// In-memory rollup processor log. Submitted call data is mined into the
/// next block straight away.
pub struct MockChain {
    log: Mutex<ChainLog>,
    /// Confirmations given to mined transactions.
    pub confirmations: u64,
}

#[derive(Default)]
struct ChainLog {
    events: Vec<ChainEvent>,
    txs: HashMap<TxHash, ChainTransaction>,
    blocks: HashMap<u64, ChainBlock>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(ChainLog::default()),
            confirmations: 3,
        }
    }

    /// Publishes `call_data` as rollup `rollup_id` in `block_number`.
    pub fn add_rollup(
        &self,
        rollup_id: u32,
        block_number: u64,
        confirmations: u64,
        call_data: Vec<u8>,
    ) -> TxHash {
        let mut log = self.log.lock().unwrap();
        let mut hash = [0u8; 32];
        hash[..4].copy_from_slice(&rollup_id.to_be_bytes());
        hash[24..].copy_from_slice(&block_number.to_be_bytes());
        let tx_hash = TxHash(hash);

        let log_index = log
            .events
            .iter()
            .filter(|e| e.block_number == block_number)
            .count() as u32;
        log.events.push(ChainEvent {
            block_number,
            log_index,
            tx_hash,
            data: EventData::RollupProcessed { rollup_id },
        });
        log.txs.insert(
            tx_hash,
            ChainTransaction {
                hash: tx_hash,
                block_number,
                confirmations,
                gas_price: 1_000_000_000,
                input: call_data,
            },
        );
        log.blocks.insert(
            block_number,
            ChainBlock {
                number: block_number,
                timestamp: ts(1_700_000_000 + block_number as i64 * 12),
            },
        );
        tx_hash
    }

    pub fn add_event(&self, event: ChainEvent) {
        self.log.lock().unwrap().events.push(event);
    }

    fn next_block(&self) -> u64 {
        let log = self.log.lock().unwrap();
        log.blocks.keys().max().map_or(1, |b| b + 1)
    }
}

#[async_trait]
impl RollupChain for MockChain {
    async fn query_filter(
        &self,
        kind: EventKind,
        from_block: Option<u64>,
    ) -> Result<Vec<ChainEvent>> {
        let log = self.log.lock().map_err(|_| anyhow!("poisoned"))?;
        let mut events: Vec<ChainEvent> = log
            .events
            .iter()
            .filter(|e| e.data.kind() == kind)
            .filter(|e| from_block.is_none_or(|from| e.block_number >= from))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.block_number, e.log_index));
        Ok(events)
    }

    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<ChainTransaction>> {
        let log = self.log.lock().map_err(|_| anyhow!("poisoned"))?;
        Ok(log.txs.get(hash).cloned())
    }

    async fn get_transaction_receipt(&self, hash: &TxHash) -> Result<Option<ChainReceipt>> {
        let log = self.log.lock().map_err(|_| anyhow!("poisoned"))?;
        Ok(log.txs.get(hash).map(|tx| ChainReceipt {
            tx_hash: tx.hash,
            gas_used: 210_000,
            status: true,
        }))
    }

    async fn get_block(&self, number: u64) -> Result<Option<ChainBlock>> {
        let log = self.log.lock().map_err(|_| anyhow!("poisoned"))?;
        Ok(log.blocks.get(&number).cloned())
    }

    async fn send_transaction(&self, call_data: Vec<u8>) -> Result<TxHash> {
        let args = decode_process_rollup(&call_data)?;
        let header = RollupHeader::decode(&args.proof_data)?;
        let block = self.next_block();
        Ok(self.add_rollup(header.rollup_id, block, self.confirmations, call_data))
    }
}
