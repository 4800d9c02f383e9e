use futures::stream::{self, BoxStream, StreamExt};
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;

use cloak_block::{Block, DefiInteractionNote};

use super::{ChainError, ChainTransaction, EventData, EventKind, RollupChain};

/// Lazily decoded blocks. A bad transaction yields an `Err` item and the
/// stream carries on with the next one.
pub type BlockStream = BoxStream<'static, Result<Block, ChainError>>;

/// Rebuilds [`Block`]s from the rollup processor's event log.
#[derive(Clone)]
pub struct RollupDecoder {
    chain: Arc<dyn RollupChain>,
}

impl RollupDecoder {
    pub fn new(chain: Arc<dyn RollupChain>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Arc<dyn RollupChain> {
        &self.chain
    }

    /// Blocks from `rollup_id` onwards whose transactions have at least
    /// `min_confirmations`, in chain order.
    ///
    /// An unknown `rollup_id` gives an empty stream. Confirmations are read
    /// once, here; receipts, headers and call data are fetched as the stream
    /// is polled.
    pub async fn get_blocks_from(
        &self,
        rollup_id: u32,
        min_confirmations: u64,
    ) -> Result<BlockStream, ChainError> {
        let processed = self
            .chain
            .query_filter(EventKind::RollupProcessed, None)
            .await
            .map_err(ChainError::Rpc)?;
        let Some(from_block) = processed
            .iter()
            .find(|e| rollup_id_of(&e.data) == Some(rollup_id))
            .map(|e| e.block_number)
        else {
            debug!("rollup {rollup_id} not observed on chain yet");
            return Ok(stream::empty().boxed());
        };

        let mut rollup_events = self
            .chain
            .query_filter(EventKind::RollupProcessed, Some(from_block))
            .await
            .map_err(ChainError::Rpc)?;
        rollup_events.retain(|e| rollup_id_of(&e.data).is_some_and(|id| id >= rollup_id));
        rollup_events.sort_by_key(|e| (e.block_number, e.log_index));

        let mut interactions: HashMap<u64, Vec<DefiInteractionNote>> = HashMap::new();
        for event in self
            .chain
            .query_filter(EventKind::DefiBridgeProcessed, Some(from_block))
            .await
            .map_err(ChainError::Rpc)?
        {
            if let EventData::DefiBridgeProcessed(note) = event.data {
                interactions.entry(event.block_number).or_default().push(note);
            }
        }

        let mut confirmed = Vec::with_capacity(rollup_events.len());
        for event in &rollup_events {
            match self
                .chain
                .get_transaction(&event.tx_hash)
                .await
                .map_err(ChainError::Rpc)?
            {
                Some(tx) if tx.confirmations >= min_confirmations => confirmed.push(tx),
                Some(tx) => debug!(
                    "skipping tx {}: {} of {} confirmations",
                    tx.hash, tx.confirmations, min_confirmations
                ),
                None => debug!("skipping tx {}: not found", event.tx_hash),
            }
        }
        debug!(
            "rollup {rollup_id}: {} of {} txs confirmed from block {from_block}",
            confirmed.len(),
            rollup_events.len()
        );

        let chain = self.chain.clone();
        let blocks = stream::iter(confirmed).then(move |tx| {
            let chain = chain.clone();
            let interaction_result = interactions
                .get(&tx.block_number)
                .cloned()
                .unwrap_or_default();
            async move { decode_block(chain.as_ref(), tx, interaction_result).await }
        });
        Ok(blocks.boxed())
    }
}

fn rollup_id_of(data: &EventData) -> Option<u32> {
    match data {
        EventData::RollupProcessed { rollup_id } => Some(*rollup_id),
        EventData::DefiBridgeProcessed(_) => None,
    }
}

async fn decode_block(
    chain: &dyn RollupChain,
    tx: ChainTransaction,
    interaction_result: Vec<DefiInteractionNote>,
) -> Result<Block, ChainError> {
    let receipt = chain
        .get_transaction_receipt(&tx.hash)
        .await
        .map_err(ChainError::Rpc)?
        .ok_or(ChainError::MissingReceipt(tx.hash))?;
    let header = chain
        .get_block(tx.block_number)
        .await
        .map_err(ChainError::Rpc)?
        .ok_or(ChainError::MissingBlock(tx.block_number))?;

    Block::from_call_data(
        &tx.input,
        tx.hash,
        header.timestamp,
        tx.gas_price,
        receipt.gas_used,
        interaction_result,
    )
    .map_err(|source| ChainError::Decode {
        tx_hash: tx.hash,
        source,
    })
}
