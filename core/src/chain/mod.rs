//! L1 rollup log access.

pub mod decoder;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use cloak_block::{DecodeError, DefiInteractionNote};
use cloak_primitives::TxHash;

pub use decoder::{BlockStream, RollupDecoder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RollupProcessed,
    DefiBridgeProcessed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    RollupProcessed { rollup_id: u32 },
    DefiBridgeProcessed(DefiInteractionNote),
}

impl EventData {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RollupProcessed { .. } => EventKind::RollupProcessed,
            Self::DefiBridgeProcessed(_) => EventKind::DefiBridgeProcessed,
        }
    }
}

/// A log emitted by the rollup processor contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    pub block_number: u64,
    pub log_index: u32,
    pub tx_hash: TxHash,
    pub data: EventData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransaction {
    pub hash: TxHash,
    pub block_number: u64,
    /// Blocks on top of the including block, counting it.
    pub confirmations: u64,
    pub gas_price: u128,
    pub input: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub tx_hash: TxHash,
    pub gas_used: u64,
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Binding to the rollup processor contract. RPC plumbing lives behind it.
#[async_trait]
pub trait RollupChain: Send + Sync {
    /// Events of `kind` from `from_block` (inclusive) on, in chain order.
    async fn query_filter(&self, kind: EventKind, from_block: Option<u64>)
    -> Result<Vec<ChainEvent>>;
    async fn get_transaction(&self, hash: &TxHash) -> Result<Option<ChainTransaction>>;
    async fn get_transaction_receipt(&self, hash: &TxHash) -> Result<Option<ChainReceipt>>;
    async fn get_block(&self, number: u64) -> Result<Option<ChainBlock>>;
    /// Submits already encoded call data to the rollup processor.
    async fn send_transaction(&self, call_data: Vec<u8>) -> Result<TxHash>;
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain rpc: {0:#}")]
    Rpc(anyhow::Error),
    #[error("tx {tx_hash}: {source}")]
    Decode {
        tx_hash: TxHash,
        #[source]
        source: DecodeError,
    },
    #[error("no receipt for tx {0}")]
    MissingReceipt(TxHash),
    #[error("block {0} not found")]
    MissingBlock(u64),
}
