use anyhow::{Context, Result};
use futures::StreamExt;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use cloak_config::CloakConfig;

use super::processor::BlockProcessor;
use crate::chain::{ChainError, RollupDecoder};
use crate::storage::WalletDb;

/// Pulls confirmed rollups from L1 and folds them into every local user.
pub struct RollupSync {
    db: Arc<dyn WalletDb>,
    decoder: RollupDecoder,
    min_confirmations: u64,
    poll_interval: Duration,
}

impl RollupSync {
    pub fn new(db: Arc<dyn WalletDb>, decoder: RollupDecoder, config: &CloakConfig) -> Self {
        Self {
            db,
            decoder,
            min_confirmations: config.chain.min_confirmations,
            poll_interval: config.sync.poll_interval(),
        }
    }

    /// One catch-up pass. Returns the number of blocks decoded.
    ///
    /// A user whose block fails to apply is left at its last good rollup for
    /// the rest of the pass and retried on the next one. Undecodable rollup
    /// transactions are skipped; any other chain failure ends the pass with an
    /// error so the unread rollup is fetched again next time.
    pub async fn sync_once(&self) -> Result<usize> {
        let users = self.db.get_users()?;
        let Some(lowest) = users.iter().map(|u| u.synced_to_rollup).min() else {
            return Ok(0);
        };
        let from = u32::try_from(lowest + 1).context("synced rollup id out of range")?;

        let mut blocks = self
            .decoder
            .get_blocks_from(from, self.min_confirmations)
            .await?;

        let processor = BlockProcessor::new(self.db.as_ref());
        let mut failed = HashSet::new();
        let mut decoded = 0;

        while let Some(item) = blocks.next().await {
            let block = match item {
                Ok(block) => block,
                Err(e @ ChainError::Decode { .. }) => {
                    warn!("skipping rollup tx: {e}");
                    continue;
                }
                // Later blocks must not move anyone past a rollup we failed to read.
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("reading rollups from {from} after {decoded} block(s)")));
                }
            };
            decoded += 1;

            for user in self.db.get_users()? {
                if failed.contains(&user.id) {
                    continue;
                }
                if let Err(e) = processor.apply_block(&user, &block) {
                    error!("rollup {} for {}: {e:#}", block.rollup_id, user.id);
                    failed.insert(user.id);
                }
            }
        }

        if decoded > 0 {
            info!("synced {decoded} rollup(s) from {from}");
        } else {
            debug!("no new rollups from {from}");
        }
        Ok(decoded)
    }

    /// Polls until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        info!("rollup sync every {:?}", self.poll_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("rollup sync stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        error!("rollup sync failed: {e:#}");
                    }
                }
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
