use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

use cloak_block::{DecodeError, ProcessRollupArgs, encode_process_rollup};
use cloak_primitives::{
    AccountPublicKey, AssetId, DATA_TREE_DEPTH, EthAddress, HashPath, NoteValue, TxHash,
};
use cloak_privacy::{TreeNote, UserKeys, ViewingKey, encrypt_note, note_bundle_digest};

use super::JoinSplitError;
use super::prover::{JoinSplitProver, WorldState};
use super::signer::{EthSigner, deposit_signing_digest, normalize_recovery_byte};
use super::tx::JoinSplitTx;
use crate::note_picker::NotePicker;
use crate::storage::{Note, UserData};

/// Tree index given to padding inputs.
pub const DUMMY_NOTE_INDEX: u64 = 0;
/// Account slot recorded until account proofs are wired in.
pub const ACCOUNT_INDEX_PLACEHOLDER: u32 = 0;

/// Parameters of one transfer, deposit or withdrawal.
#[derive(Debug, Clone)]
pub struct JoinSplitRequest {
    pub sender: UserData,
    /// Candidate notes, normally `WalletDb::get_user_notes(sender)`.
    pub notes: Vec<Note>,
    pub asset_id: AssetId,
    pub public_input: NoteValue,
    pub public_output: NoteValue,
    pub new_note_value: NoteValue,
    /// Owner of the destination note. A throwaway key when absent.
    pub receiver: Option<AccountPublicKey>,
    /// L1 recipient of `public_output`.
    pub output_owner: Option<EthAddress>,
}

#[derive(Debug, Clone)]
pub struct JoinSplitProofOutput {
    pub tx: JoinSplitTx,
    pub tx_hash: TxHash,
    pub proof_data: Vec<u8>,
    /// `[destination, change]`
    pub viewing_keys: [ViewingKey; 2],
    pub deposit_signature: Option<Vec<u8>>,
}

impl JoinSplitProofOutput {
    pub fn viewing_keys_blob(&self) -> Vec<u8> {
        self.viewing_keys
            .iter()
            .flat_map(|vk| vk.as_bytes().iter().copied())
            .collect()
    }

    /// `processRollup` call data carrying this proof alone.
    pub fn to_call_data(&self) -> Result<Vec<u8>, DecodeError> {
        encode_process_rollup(&ProcessRollupArgs {
            proof_data: self.proof_data.clone(),
            signatures: self.deposit_signature.clone().unwrap_or_default(),
            viewing_keys: self.viewing_keys_blob(),
        })
    }
}

/// Stateless between calls: dropping a pending `create_proof` leaves nothing
/// behind.
pub struct JoinSplitTxBuilder {
    prover: Arc<dyn JoinSplitProver>,
    world_state: Arc<dyn WorldState>,
    proof_timeout: Option<Duration>,
}

impl JoinSplitTxBuilder {
    pub fn new(prover: Arc<dyn JoinSplitProver>, world_state: Arc<dyn WorldState>) -> Self {
        Self {
            prover,
            world_state,
            proof_timeout: None,
        }
    }

    pub fn with_proof_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.proof_timeout = timeout;
        self
    }

    pub async fn create_proof(
        &self,
        req: JoinSplitRequest,
        signer: Option<&dyn EthSigner>,
    ) -> Result<JoinSplitProofOutput, JoinSplitError> {
        let keys = req.sender.keys();
        let sender_pk = keys.public_key();
        let asset_id = req.asset_id;

        let is_deposit = !req.public_input.is_zero();
        let input_owner = match (is_deposit, signer) {
            (false, _) => EthAddress::ZERO,
            (true, None) => return Err(JoinSplitError::SignerRequired),
            (true, Some(signer)) => signer.get_address().await.map_err(JoinSplitError::Signer)?,
        };

        let spent = req
            .new_note_value
            .checked_add(&req.public_output)
            .ok_or(JoinSplitError::ValueOverflow)?;
        let required = spent.saturating_sub(&req.public_input);
        let candidates = req.notes.into_iter().filter(|n| n.asset_id == asset_id);
        let selected = NotePicker::new(candidates).pick(&required)?;
        let num_input_notes = selected.len();
        debug!(
            "join-split for {}: required {}, {} real input(s)",
            req.sender.id, required, num_input_notes
        );

        let mut real_inputs = selected.iter().map(|n| (n.index, n.tree_note()));
        let [first, second] = [(); 2].map(|_| {
            real_inputs
                .next()
                .unwrap_or_else(|| (DUMMY_NOTE_INDEX, TreeNote::dummy(sender_pk, asset_id)))
        });
        let input_note_indices = [first.0, second.0];
        let input_notes = [first.1, second.1];

        let input_note_paths = [
            self.hash_path(input_note_indices[0]).await?,
            self.hash_path(input_note_indices[1]).await?,
        ];

        let total_input = NoteValue::checked_sum(input_notes.iter().map(|n| &n.value))
            .ok_or(JoinSplitError::ValueOverflow)?;
        let change = total_input.saturating_sub(&spent);

        let receiver = req
            .receiver
            .unwrap_or_else(|| UserKeys::random().public_key());
        let output_notes = [
            TreeNote::new(receiver, req.new_note_value.clone(), asset_id),
            TreeNote::new(sender_pk, change, asset_id),
        ];
        let viewing_keys = [
            encrypt_note(&output_notes[0])?,
            encrypt_note(&output_notes[1])?,
        ];

        let signature = keys.sign(&note_bundle_digest(&input_notes, &output_notes));

        let merkle_root = self
            .world_state
            .get_root()
            .await
            .map_err(JoinSplitError::WorldState)?;

        let tx = JoinSplitTx {
            public_input: req.public_input,
            public_output: req.public_output,
            asset_id,
            num_input_notes,
            input_note_indices,
            merkle_root,
            input_note_paths,
            input_notes,
            output_notes,
            signature,
            input_owner,
            output_owner: req.output_owner.unwrap_or(EthAddress::ZERO),
            account_index: ACCOUNT_INDEX_PLACEHOLDER,
            account_path: HashPath::zeroed(DATA_TREE_DEPTH),
            signing_pub_key: sender_pk.signer,
            account_private_key: *keys.private_key(),
        };
        let tx_hash = tx.tx_hash()?;

        let proof_data = self.prove(&tx).await?;
        info!("join-split proof {} ({} bytes)", tx_hash, proof_data.len());

        let deposit_signature = match signer {
            Some(signer) if is_deposit => {
                let digest =
                    deposit_signing_digest(&tx.public_input, asset_id, &input_owner, &tx_hash);
                let raw = signer
                    .sign_message(&digest)
                    .await
                    .map_err(JoinSplitError::Signer)?;
                Some(normalize_recovery_byte(raw)?)
            }
            _ => None,
        };

        Ok(JoinSplitProofOutput {
            tx,
            tx_hash,
            proof_data,
            viewing_keys,
            deposit_signature,
        })
    }

    async fn hash_path(&self, index: u64) -> Result<HashPath, JoinSplitError> {
        self.world_state
            .get_hash_path(index)
            .await
            .map_err(JoinSplitError::WorldState)
    }

    async fn prove(&self, tx: &JoinSplitTx) -> Result<Vec<u8>, JoinSplitError> {
        let proving = self.prover.create_join_split_proof(tx);
        let result = match self.proof_timeout {
            Some(limit) => tokio::time::timeout(limit, proving)
                .await
                .map_err(|_| JoinSplitError::ProofTimeout(limit))?,
            None => proving.await,
        };
        result.map_err(JoinSplitError::Prover)
    }
}
