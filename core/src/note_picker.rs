//! Chooses which notes fund a join-split.
//!
//! The circuit takes exactly two inputs, so a target is covered by a single
//! note or a pair, never more. Among the candidates the one with the
//! smallest total wins; a single note wins a tie with a pair.

use num_bigint::BigUint;
use thiserror::Error;

use cloak_primitives::NoteValue;

use crate::storage::Note;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotePickerError {
    #[error("insufficient funds: need {required}, best two notes hold {available}")]
    InsufficientFunds {
        required: NoteValue,
        available: NoteValue,
    },
}

pub struct NotePicker {
    /// Unspent notes, ascending by value then index.
    notes: Vec<Note>,
}

impl NotePicker {
    pub fn new(notes: impl IntoIterator<Item = Note>) -> Self {
        let mut notes: Vec<Note> = notes.into_iter().filter(|n| !n.nullified).collect();
        notes.sort_by(|a, b| a.value.cmp(&b.value).then(a.index.cmp(&b.index)));
        Self { notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Sum of the two largest notes, the most a single join-split can spend.
    pub fn max_spendable(&self) -> NoteValue {
        let sum: BigUint = self
            .notes
            .iter()
            .rev()
            .take(2)
            .map(|n| n.value.as_biguint())
            .sum();
        NoteValue::try_from(sum).unwrap_or_else(|_| NoteValue::max())
    }

    pub fn pick(&self, target: &NoteValue) -> Result<Vec<Note>, NotePickerError> {
        if target.is_zero() {
            return Ok(Vec::new());
        }

        let single = self.best_single(target);
        let pair = self.best_pair(target);

        let picked = match (single, pair) {
            (Some(i), Some((a, b, pair_sum))) => {
                if self.notes[i].value.as_biguint() <= &pair_sum {
                    vec![i]
                } else {
                    vec![a, b]
                }
            }
            (Some(i), None) => vec![i],
            (None, Some((a, b, _))) => vec![a, b],
            (None, None) => {
                return Err(NotePickerError::InsufficientFunds {
                    required: target.clone(),
                    available: self.max_spendable(),
                });
            }
        };

        let mut notes: Vec<Note> = picked.into_iter().map(|i| self.notes[i].clone()).collect();
        notes.sort_by_key(|n| n.index);
        Ok(notes)
    }

    /// Smallest single note covering `target`.
    fn best_single(&self, target: &NoteValue) -> Option<usize> {
        let pos = self.notes.partition_point(|n| n.value < *target);
        (pos < self.notes.len()).then_some(pos)
    }

    /// Pair with the smallest sum covering `target`, by two pointers over the
    /// sorted values.
    fn best_pair(&self, target: &NoteValue) -> Option<(usize, usize, BigUint)> {
        if self.notes.len() < 2 {
            return None;
        }
        let target = target.as_biguint();
        let mut best: Option<(usize, usize, BigUint)> = None;
        let (mut lo, mut hi) = (0, self.notes.len() - 1);

        while lo < hi {
            let sum = self.notes[lo].value.as_biguint() + self.notes[hi].value.as_biguint();
            if &sum >= target {
                if best.as_ref().is_none_or(|(_, _, s)| sum < *s) {
                    best = Some((lo, hi, sum));
                }
                hi -= 1;
            } else {
                lo += 1;
            }
        }
        best
    }
}
