use cloak_block::{DecodeError, InnerProofData, ProofId};
use cloak_primitives::{AssetId, EthAddress, HashPath, NoteValue, TxHash};
use cloak_privacy::{Nullifier, NullifierKey, TreeNote, UserKeys};

/// Everything the prover needs for one two-in, two-out join-split.
#[derive(Clone)]
pub struct JoinSplitTx {
    pub public_input: NoteValue,
    pub public_output: NoteValue,
    pub asset_id: AssetId,
    /// Real (non-dummy) inputs, 0 to 2.
    pub num_input_notes: usize,
    pub input_note_indices: [u64; 2],
    pub merkle_root: [u8; 32],
    pub input_note_paths: [HashPath; 2],
    pub input_notes: [TreeNote; 2],
    /// `[destination, change]`
    pub output_notes: [TreeNote; 2],
    /// Ed25519 signature over the four notes.
    pub signature: [u8; 64],
    pub input_owner: EthAddress,
    pub output_owner: EthAddress,
    pub account_index: u32,
    pub account_path: HashPath,
    pub signing_pub_key: [u8; 32],
    pub account_private_key: [u8; 32],
}

impl JoinSplitTx {
    pub fn nullifiers(&self) -> [Nullifier; 2] {
        let keys = UserKeys::from_private_key(self.account_private_key);
        let nk = NullifierKey::from_bytes(keys.privacy_secret());
        [0, 1].map(|i| {
            nk.derive_nullifier(
                &self.input_notes[i].commitment(),
                self.input_note_indices[i],
            )
        })
    }

    /// The public fields this join-split contributes to a rollup.
    pub fn inner_proof_data(&self) -> InnerProofData {
        let [nullifier1, nullifier2] = self.nullifiers();
        InnerProofData {
            proof_id: ProofId::JoinSplit,
            public_input: self.public_input.clone(),
            public_output: self.public_output.clone(),
            asset_id: self.asset_id,
            new_note1: self.output_notes[0].commitment().0,
            new_note2: self.output_notes[1].commitment().0,
            nullifier1: nullifier1.0,
            nullifier2: nullifier2.0,
            input_owner: self.input_owner,
            output_owner: self.output_owner,
        }
    }

    pub fn tx_hash(&self) -> Result<TxHash, DecodeError> {
        self.inner_proof_data().tx_hash()
    }
}

impl std::fmt::Debug for JoinSplitTx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinSplitTx")
            .field("public_input", &self.public_input)
            .field("public_output", &self.public_output)
            .field("asset_id", &self.asset_id)
            .field("num_input_notes", &self.num_input_notes)
            .field("input_note_indices", &self.input_note_indices)
            .field("input_owner", &self.input_owner)
            .field("output_owner", &self.output_owner)
            .finish_non_exhaustive()
    }
}
