//! Rollup proof data layout
//!
//! ```text
//! header  (6 words):  rollup_id | rollup_size | data_start_index
//!                     | old_data_root | new_data_root | num_txs
//! inner   (10 words each, num_txs times):
//!                     proof_id | public_input | public_output | asset_id
//!                     | new_note_1 | new_note_2 | nullifier_1 | nullifier_2
//!                     | input_owner | output_owner
//! tail:               opaque aggregated proof
//! ```
//!
//! Every field is a 32-byte big-endian word.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use sha3::{Digest, Keccak256};
use std::io::{Cursor, Read, Write};

use cloak_primitives::{AssetId, EthAddress, NoteValue, TxHash};

use crate::DecodeError;

pub const WORD_SIZE: usize = 32;
pub const HEADER_WORDS: usize = 6;
pub const HEADER_SIZE: usize = HEADER_WORDS * WORD_SIZE;
pub const INNER_PROOF_WORDS: usize = 10;
pub const INNER_PROOF_SIZE: usize = INNER_PROOF_WORDS * WORD_SIZE;

/// Kind of inner proof carried in a rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ProofId {
    JoinSplit = 0,
    Account = 1,
    DefiDeposit = 2,
    Padding = 3,
}

impl TryFrom<u32> for ProofId {
    type Error = DecodeError;

    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::JoinSplit),
            1 => Ok(Self::Account),
            2 => Ok(Self::DefiDeposit),
            3 => Ok(Self::Padding),
            other => Err(DecodeError::UnknownProofId(other)),
        }
    }
}

/// Rollup id and size, enough to place a block in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollupHeader {
    pub rollup_id: u32,
    pub rollup_size: u32,
    pub data_start_index: u32,
    pub old_data_root: [u8; 32],
    pub new_data_root: [u8; 32],
    pub num_txs: u32,
}

impl RollupHeader {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                what: "rollup header",
                need: HEADER_SIZE,
                got: bytes.len(),
            });
        }
        let mut cursor = Cursor::new(bytes);
        Ok(Self {
            rollup_id: read_u32_word(&mut cursor)?,
            rollup_size: read_u32_word(&mut cursor)?,
            data_start_index: read_u32_word(&mut cursor)?,
            old_data_root: read_word(&mut cursor)?,
            new_data_root: read_word(&mut cursor)?,
            num_txs: read_u32_word(&mut cursor)?,
        })
    }

    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), DecodeError> {
        write_u32_word(out, self.rollup_id)?;
        write_u32_word(out, self.rollup_size)?;
        write_u32_word(out, self.data_start_index)?;
        out.write_all(&self.old_data_root)?;
        out.write_all(&self.new_data_root)?;
        write_u32_word(out, self.num_txs)?;
        Ok(())
    }
}

/// Public fields of one join-split inside a rollup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerProofData {
    pub proof_id: ProofId,
    pub public_input: NoteValue,
    pub public_output: NoteValue,
    pub asset_id: AssetId,
    pub new_note1: [u8; 32],
    pub new_note2: [u8; 32],
    pub nullifier1: [u8; 32],
    pub nullifier2: [u8; 32],
    pub input_owner: EthAddress,
    pub output_owner: EthAddress,
}

impl InnerProofData {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < INNER_PROOF_SIZE {
            return Err(DecodeError::Truncated {
                what: "inner proof",
                need: INNER_PROOF_SIZE,
                got: bytes.len(),
            });
        }
        let mut cursor = Cursor::new(bytes);
        Ok(Self {
            proof_id: ProofId::try_from(read_u32_word(&mut cursor)?)?,
            public_input: NoteValue::from_be_bytes(&read_word(&mut cursor)?),
            public_output: NoteValue::from_be_bytes(&read_word(&mut cursor)?),
            asset_id: read_u32_word(&mut cursor)?,
            new_note1: read_word(&mut cursor)?,
            new_note2: read_word(&mut cursor)?,
            nullifier1: read_word(&mut cursor)?,
            nullifier2: read_word(&mut cursor)?,
            input_owner: EthAddress::from_word(&read_word(&mut cursor)?),
            output_owner: EthAddress::from_word(&read_word(&mut cursor)?),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::with_capacity(INNER_PROOF_SIZE);
        write_u32_word(&mut out, self.proof_id as u32)?;
        out.write_all(&self.public_input.to_be_bytes())?;
        out.write_all(&self.public_output.to_be_bytes())?;
        write_u32_word(&mut out, self.asset_id)?;
        out.write_all(&self.new_note1)?;
        out.write_all(&self.new_note2)?;
        out.write_all(&self.nullifier1)?;
        out.write_all(&self.nullifier2)?;
        out.write_all(&self.input_owner.to_word())?;
        out.write_all(&self.output_owner.to_word())?;
        Ok(out)
    }

    /// Transaction id: Keccak-256 of the encoded public fields.
    pub fn tx_hash(&self) -> Result<TxHash, DecodeError> {
        Ok(TxHash(Keccak256::digest(self.encode()?).into()))
    }
}

/// A decoded rollup: header plus its inner join-splits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupProofData {
    pub header: RollupHeader,
    pub inner_proofs: Vec<InnerProofData>,
    pub proof: Vec<u8>,
}

impl RollupProofData {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = RollupHeader::decode(bytes)?;
        let num_txs = header.num_txs as usize;
        let body_end = num_txs
            .checked_mul(INNER_PROOF_SIZE)
            .and_then(|len| len.checked_add(HEADER_SIZE))
            .ok_or(DecodeError::TooManyTxs(header.num_txs))?;
        if bytes.len() < body_end {
            return Err(DecodeError::Truncated {
                what: "rollup inner proofs",
                need: body_end,
                got: bytes.len(),
            });
        }

        let inner_proofs = bytes[HEADER_SIZE..body_end]
            .chunks_exact(INNER_PROOF_SIZE)
            .map(InnerProofData::decode)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header,
            inner_proofs,
            proof: bytes[body_end..].to_vec(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        if self.inner_proofs.len() != self.header.num_txs as usize {
            return Err(DecodeError::TxCountMismatch {
                header: self.header.num_txs,
                actual: self.inner_proofs.len(),
            });
        }
        let mut out =
            Vec::with_capacity(HEADER_SIZE + self.inner_proofs.len() * INNER_PROOF_SIZE);
        self.header.encode(&mut out)?;
        for inner in &self.inner_proofs {
            out.extend_from_slice(&inner.encode()?);
        }
        out.extend_from_slice(&self.proof);
        Ok(out)
    }
}

fn read_word(cursor: &mut Cursor<&[u8]>) -> Result<[u8; 32], DecodeError> {
    let mut word = [0u8; 32];
    cursor.read_exact(&mut word)?;
    Ok(word)
}

/// Reads a word that must hold a value below 2^32.
fn read_u32_word(cursor: &mut Cursor<&[u8]>) -> Result<u32, DecodeError> {
    let mut high = [0u8; 28];
    cursor.read_exact(&mut high)?;
    if high.iter().any(|b| *b != 0) {
        return Err(DecodeError::WordOverflow);
    }
    Ok(cursor.read_u32::<BigEndian>()?)
}

fn write_u32_word(out: &mut Vec<u8>, value: u32) -> Result<(), DecodeError> {
    out.write_all(&[0u8; 28])?;
    out.write_u32::<BigEndian>(value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner(seed: u8) -> InnerProofData {
        InnerProofData {
            proof_id: ProofId::JoinSplit,
            public_input: NoteValue::from(seed as u64),
            public_output: NoteValue::zero(),
            asset_id: 0,
            new_note1: [seed; 32],
            new_note2: [seed.wrapping_add(1); 32],
            nullifier1: [seed.wrapping_add(2); 32],
            nullifier2: [seed.wrapping_add(3); 32],
            input_owner: EthAddress([seed; 20]),
            output_owner: EthAddress::ZERO,
        }
    }

    fn rollup(num_txs: u32) -> RollupProofData {
        RollupProofData {
            header: RollupHeader {
                rollup_id: 5,
                rollup_size: 4,
                data_start_index: 64,
                old_data_root: [1u8; 32],
                new_data_root: [2u8; 32],
                num_txs,
            },
            inner_proofs: (0..num_txs).map(|i| inner(i as u8 * 10)).collect(),
            proof: vec![0xaa; 48],
        }
    }

    #[test]
    fn header_is_read_from_leading_words() {
        let bytes = rollup(2).encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 2 * INNER_PROOF_SIZE + 48);

        let header = RollupHeader::decode(&bytes).unwrap();
        assert_eq!(header.rollup_id, 5);
        assert_eq!(header.rollup_size, 4);
        assert_eq!(header.data_start_index, 64);
    }

    #[test]
    fn decode_recovers_inner_proofs_and_tail() {
        let data = rollup(3);
        let decoded = RollupProofData::decode(&data.encode().unwrap()).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn truncated_rollup_is_rejected() {
        let bytes = rollup(2).encode().unwrap();
        let cut = &bytes[..HEADER_SIZE + INNER_PROOF_SIZE];
        assert!(matches!(
            RollupProofData::decode(cut),
            Err(DecodeError::Truncated { .. })
        ));
        assert!(RollupHeader::decode(&bytes[..HEADER_SIZE - 1]).is_err());
    }

    #[test]
    fn oversized_u32_word_is_rejected() {
        let mut bytes = rollup(0).encode().unwrap();
        bytes[0] = 1; // high byte of rollup_id
        assert!(matches!(
            RollupHeader::decode(&bytes),
            Err(DecodeError::WordOverflow)
        ));
    }

    #[test]
    fn tx_hash_changes_with_public_fields() {
        let a = inner(1);
        let mut b = inner(1);
        assert_eq!(a.tx_hash().unwrap(), b.tx_hash().unwrap());
        b.public_output = NoteValue::from(1u64);
        assert_ne!(a.tx_hash().unwrap(), b.tx_hash().unwrap());
    }
}
