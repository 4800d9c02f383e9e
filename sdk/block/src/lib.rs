pub mod calldata;
pub mod rollup;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use cloak_primitives::{NoteValue, TxHash};

pub use calldata::{
    PROCESS_ROLLUP_SIGNATURE, ProcessRollupArgs, decode_process_rollup, encode_process_rollup,
    process_rollup_selector,
};
pub use rollup::{InnerProofData, ProofId, RollupHeader, RollupProofData};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{what} truncated: need {need} bytes, got {got}")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },
    #[error("word value does not fit its field")]
    WordOverflow,
    #[error("unknown proof id {0}")]
    UnknownProofId(u32),
    #[error("rollup claims {0} txs")]
    TooManyTxs(u32),
    #[error("header says {header} txs, found {actual}")]
    TxCountMismatch { header: u32, actual: usize },
    #[error("unexpected selector 0x{}", hex::encode(.0))]
    BadSelector([u8; 4]),
    #[error("bad offset {offset} for {field}")]
    BadOffset { field: &'static str, offset: usize },
}

/// Result of one bridge interaction, emitted next to the rollup that settled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefiInteractionNote {
    #[serde(with = "hex::serde")]
    pub bridge_id: [u8; 32],
    pub nonce: u32,
    pub total_input_value: NoteValue,
    pub total_output_value_a: NoteValue,
    pub total_output_value_b: NoteValue,
    pub result: bool,
}

/// A rollup as published on chain, not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub created: DateTime<Utc>,
    pub tx_hash: TxHash,
    #[serde(with = "hex::serde")]
    pub rollup_proof_data: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub viewing_keys_data: Vec<u8>,
    pub interaction_result: Vec<DefiInteractionNote>,
    pub rollup_id: u32,
    pub rollup_size: u32,
    pub gas_price: u128,
    pub gas_used: u64,
}

impl Block {
    /// Builds a block from `processRollup` call data and the chain metadata
    /// around it. Rollup id and size come from the proof header.
    pub fn from_call_data(
        call_data: &[u8],
        tx_hash: TxHash,
        created: DateTime<Utc>,
        gas_price: u128,
        gas_used: u64,
        interaction_result: Vec<DefiInteractionNote>,
    ) -> Result<Self, DecodeError> {
        let args = decode_process_rollup(call_data)?;
        let header = RollupHeader::decode(&args.proof_data)?;
        Ok(Self {
            created,
            tx_hash,
            rollup_proof_data: args.proof_data,
            viewing_keys_data: args.viewing_keys,
            interaction_result,
            rollup_id: header.rollup_id,
            rollup_size: header.rollup_size,
            gas_price,
            gas_used,
        })
    }

    pub fn decode_proof(&self) -> Result<RollupProofData, DecodeError> {
        RollupProofData::decode(&self.rollup_proof_data)
    }
}
