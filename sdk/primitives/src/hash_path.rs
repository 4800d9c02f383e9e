use serde::{Deserialize, Serialize};

use crate::PrimitiveError;

/// Depth of the note commitment tree (supports 2^32 notes).
pub const DATA_TREE_DEPTH: usize = 32;

/// A merkle membership path.
///
/// One `(left, right)` pair per level, leaf level first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashPath {
    pub levels: Vec<([u8; 32], [u8; 32])>,
}

impl HashPath {
    pub fn new(levels: Vec<([u8; 32], [u8; 32])>) -> Self {
        Self { levels }
    }

    /// All-zero path of the given depth, used where a path is required by
    /// the descriptor shape but not checked by the circuit.
    pub fn zeroed(depth: usize) -> Self {
        Self {
            levels: vec![([0u8; 32], [0u8; 32]); depth],
        }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.levels.len() * 64);
        out.extend_from_slice(&(self.levels.len() as u32).to_be_bytes());
        for (left, right) in &self.levels {
            out.extend_from_slice(left);
            out.extend_from_slice(right);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        if bytes.len() < 4 {
            return Err(PrimitiveError::Truncated("hash path length"));
        }
        let depth = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let body = &bytes[4..];
        if body.len() != depth * 64 {
            return Err(PrimitiveError::InvalidLength {
                what: "hash path",
                expected: depth * 64,
                got: body.len(),
            });
        }
        let levels = body
            .chunks_exact(64)
            .map(|chunk| {
                let mut left = [0u8; 32];
                let mut right = [0u8; 32];
                left.copy_from_slice(&chunk[..32]);
                right.copy_from_slice(&chunk[32..]);
                (left, right)
            })
            .collect();
        Ok(Self { levels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_path_has_requested_depth() {
        let path = HashPath::zeroed(DATA_TREE_DEPTH);
        assert_eq!(path.depth(), DATA_TREE_DEPTH);
        assert_eq!(path.to_bytes().len(), 4 + DATA_TREE_DEPTH * 64);
    }

    #[test]
    fn truncated_path_is_rejected() {
        let path = HashPath::new(vec![([1u8; 32], [2u8; 32]); 3]);
        let bytes = path.to_bytes();
        assert_eq!(HashPath::from_bytes(&bytes).unwrap(), path);
        assert!(HashPath::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(HashPath::from_bytes(&[0, 0]).is_err());
    }
}
