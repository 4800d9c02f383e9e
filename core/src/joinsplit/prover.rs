use anyhow::Result;
use async_trait::async_trait;

use cloak_primitives::HashPath;

use super::tx::JoinSplitTx;

/// Produces a join-split proof for a descriptor. Opaque to the engine.
#[async_trait]
pub trait JoinSplitProver: Send + Sync {
    async fn create_join_split_proof(&self, tx: &JoinSplitTx) -> Result<Vec<u8>>;
}

/// Read access to the note commitment tree.
#[async_trait]
pub trait WorldState: Send + Sync {
    async fn get_root(&self) -> Result<[u8; 32]>;
    async fn get_hash_path(&self, index: u64) -> Result<HashPath>;
}
