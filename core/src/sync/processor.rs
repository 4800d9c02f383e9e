use anyhow::{Context, Result};
use log::{debug, warn};

use cloak_block::{Block, InnerProofData, ProofId};
use cloak_primitives::NoteValue;
use cloak_privacy::{Nullifier, NullifierKey, decrypt_note, split_viewing_keys};

use crate::storage::{Note, TxAction, UserData, UserTx, WalletDb};

/// What applying one block changed for one user.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    pub notes_added: usize,
    pub notes_nullified: usize,
    pub txs_settled: usize,
    pub txs_recorded: usize,
    /// The user had already synced past this rollup.
    pub skipped: bool,
}

/// Applies decoded rollups to a user's notes and history.
pub struct BlockProcessor<'a, D: WalletDb + ?Sized> {
    db: &'a D,
}

impl<'a, D: WalletDb + ?Sized> BlockProcessor<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self { db }
    }

    pub fn apply_block(&self, user: &UserData, block: &Block) -> Result<BlockOutcome> {
        if i64::from(block.rollup_id) <= user.synced_to_rollup {
            return Ok(BlockOutcome {
                skipped: true,
                ..Default::default()
            });
        }

        let proof = block
            .decode_proof()
            .with_context(|| format!("rollup {} proof data", block.rollup_id))?;
        let viewing_keys = split_viewing_keys(&block.viewing_keys_data)
            .with_context(|| format!("rollup {} viewing keys", block.rollup_id))?;
        let privacy_secret = user.keys().privacy_secret();
        let nullifier_key = NullifierKey::from_bytes(privacy_secret);

        let mut outcome = BlockOutcome::default();

        for (i, inner) in proof.inner_proofs.iter().enumerate() {
            if inner.proof_id == ProofId::Padding {
                continue;
            }

            // Inputs: our notes whose nullifiers were published. A note may
            // already be nullified by an earlier, interrupted attempt at this
            // block; it still counts as spent here.
            let mut spent = Vec::new();
            for nullifier in [inner.nullifier1, inner.nullifier2] {
                let Some(note) = self.db.get_note_by_nullifier(&Nullifier(nullifier))? else {
                    continue;
                };
                if note.owner != user.id {
                    continue;
                }
                if !note.nullified {
                    self.db.nullify_note(note.index)?;
                    outcome.notes_nullified += 1;
                }
                spent.push(note.value);
            }

            // Outputs: notes that decrypt under our privacy key.
            let mut received = Vec::new();
            for (j, commitment) in [inner.new_note1, inner.new_note2].iter().enumerate() {
                let position = 2 * i + j;
                let Some(viewing_key) = viewing_keys.get(position) else {
                    continue;
                };
                let Some(tree_note) = decrypt_note(viewing_key, &privacy_secret, user.public_key())
                else {
                    continue;
                };
                let note_commitment = tree_note.commitment();
                if note_commitment.0 != *commitment {
                    warn!(
                        "rollup {}: viewing key {} decrypts but does not match its commitment",
                        block.rollup_id, position
                    );
                    continue;
                }
                // Zero-value outputs are not tracked.
                if tree_note.value.is_zero() {
                    continue;
                }

                let index = u64::from(proof.header.data_start_index) + position as u64;
                self.db.add_note(&Note {
                    index,
                    owner: user.id,
                    value: tree_note.value.clone(),
                    asset_id: tree_note.asset_id,
                    secret: tree_note.secret,
                    nullifier: nullifier_key.derive_nullifier(&note_commitment, index),
                    nullified: false,
                })?;
                outcome.notes_added += 1;
                received.push(tree_note.value);
            }

            if spent.is_empty() && received.is_empty() {
                continue;
            }

            let tx_hash = inner.tx_hash()?;
            if self.db.is_user_tx_present(&user.id, &tx_hash)? {
                self.db.settle_user_tx(&user.id, &tx_hash)?;
                outcome.txs_settled += 1;
            } else {
                let spent_total =
                    NoteValue::checked_sum(&spent).context("spent value overflow")?;
                let received_total =
                    NoteValue::checked_sum(&received).context("received value overflow")?;
                let (action, value) =
                    classify(inner, !spent.is_empty(), &spent_total, &received_total);
                self.db.add_user_tx(&UserTx {
                    tx_hash,
                    user_id: user.id,
                    action,
                    asset_id: inner.asset_id,
                    value,
                    settled: true,
                    created: block.created,
                    recipient: (!inner.output_owner.is_zero()).then_some(inner.output_owner),
                })?;
                outcome.txs_recorded += 1;
            }
        }

        let mut updated = user.clone();
        updated.synced_to_rollup = updated.synced_to_rollup.max(i64::from(block.rollup_id));
        self.db.update_user(&updated)?;

        debug!(
            "rollup {} applied to {}: {:?}",
            block.rollup_id, user.id, outcome
        );
        Ok(outcome)
    }
}

/// Names a transaction this user took part in but did not record locally.
fn classify(
    inner: &InnerProofData,
    spent_any: bool,
    spent: &NoteValue,
    received: &NoteValue,
) -> (TxAction, NoteValue) {
    if spent_any && !inner.public_output.is_zero() {
        (TxAction::Withdraw, inner.public_output.clone())
    } else if spent_any {
        (TxAction::Transfer, spent.saturating_sub(received))
    } else if !inner.public_input.is_zero() {
        (TxAction::Deposit, inner.public_input.clone())
    } else {
        (TxAction::Receive, received.clone())
    }
}
