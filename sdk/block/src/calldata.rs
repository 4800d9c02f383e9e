//! `processRollup(bytes,bytes,bytes)` call data
//!
//! ```text
//! selector(4) | off_proof | off_sigs | off_vks | len | proof.. | len | sigs.. | len | vks..
//! ```
//!
//! Offsets are relative to the first argument word, and every dynamic
//! payload is right-padded to a word boundary.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use sha3::{Digest, Keccak256};
use std::io::{Cursor, Write};

use crate::DecodeError;
use crate::rollup::WORD_SIZE;

pub const PROCESS_ROLLUP_SIGNATURE: &str = "processRollup(bytes,bytes,bytes)";

const ARG_COUNT: usize = 3;

/// Arguments of one `processRollup` call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessRollupArgs {
    pub proof_data: Vec<u8>,
    pub signatures: Vec<u8>,
    pub viewing_keys: Vec<u8>,
}

pub fn process_rollup_selector() -> [u8; 4] {
    let digest = Keccak256::digest(PROCESS_ROLLUP_SIGNATURE.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

pub fn encode_process_rollup(args: &ProcessRollupArgs) -> Result<Vec<u8>, DecodeError> {
    let payloads = [&args.proof_data, &args.signatures, &args.viewing_keys];

    let mut out = Vec::with_capacity(
        4 + ARG_COUNT * WORD_SIZE
            + payloads
                .iter()
                .map(|p| WORD_SIZE + padded_len(p.len()))
                .sum::<usize>(),
    );
    out.write_all(&process_rollup_selector())?;

    let mut offset = ARG_COUNT * WORD_SIZE;
    for payload in payloads {
        write_usize_word(&mut out, offset)?;
        offset += WORD_SIZE + padded_len(payload.len());
    }
    for payload in payloads {
        write_usize_word(&mut out, payload.len())?;
        out.write_all(payload)?;
        out.resize(out.len() + padded_len(payload.len()) - payload.len(), 0);
    }
    Ok(out)
}

pub fn decode_process_rollup(input: &[u8]) -> Result<ProcessRollupArgs, DecodeError> {
    if input.len() < 4 {
        return Err(DecodeError::Truncated {
            what: "selector",
            need: 4,
            got: input.len(),
        });
    }
    let (selector, args) = input.split_at(4);
    let expected = process_rollup_selector();
    if selector != expected {
        let mut found = [0u8; 4];
        found.copy_from_slice(selector);
        return Err(DecodeError::BadSelector(found));
    }

    Ok(ProcessRollupArgs {
        proof_data: read_dynamic_bytes(args, 0, "proofData")?,
        signatures: read_dynamic_bytes(args, 1, "signatures")?,
        viewing_keys: read_dynamic_bytes(args, 2, "viewingKeys")?,
    })
}

fn read_dynamic_bytes(
    args: &[u8],
    position: usize,
    field: &'static str,
) -> Result<Vec<u8>, DecodeError> {
    let offset = read_usize_word(args, position * WORD_SIZE, field)?;
    let len = read_usize_word(args, offset, field)?;
    let start = offset
        .checked_add(WORD_SIZE)
        .ok_or(DecodeError::BadOffset { field, offset })?;
    let end = start
        .checked_add(len)
        .ok_or(DecodeError::BadOffset { field, offset })?;
    if end > args.len() {
        return Err(DecodeError::Truncated {
            what: field,
            need: end,
            got: args.len(),
        });
    }
    Ok(args[start..end].to_vec())
}

fn read_usize_word(args: &[u8], at: usize, field: &'static str) -> Result<usize, DecodeError> {
    let end = at
        .checked_add(WORD_SIZE)
        .ok_or(DecodeError::BadOffset { field, offset: at })?;
    if end > args.len() {
        return Err(DecodeError::Truncated {
            what: field,
            need: end,
            got: args.len(),
        });
    }
    let word = &args[at..end];
    if word[..WORD_SIZE - 8].iter().any(|b| *b != 0) {
        return Err(DecodeError::WordOverflow);
    }
    let value = Cursor::new(&word[WORD_SIZE - 8..]).read_u64::<BigEndian>()?;
    usize::try_from(value).map_err(|_| DecodeError::WordOverflow)
}

fn write_usize_word(out: &mut Vec<u8>, value: usize) -> Result<(), DecodeError> {
    out.write_all(&[0u8; WORD_SIZE - 8])?;
    out.write_u64::<BigEndian>(value as u64)?;
    Ok(())
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD_SIZE) * WORD_SIZE
}
