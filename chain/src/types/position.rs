use std::fmt;

use serde::{Deserialize, Serialize};

use super::BlockHash;

/// A specific block in a specific chain.
///
/// Two positions are equal only if both height and hash match. There is no
/// `Ord` impl: tips are compared by height or work, never by hash.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub height: u64,
    pub hash: BlockHash,
}

impl Position {
    pub fn new(height: u64, hash: BlockHash) -> Self {
        Self { height, hash }
    }

    /// Returns `true` if `self` sits strictly above `other`.
    pub fn is_above(&self, other: &Position) -> bool {
        self.height > other.height
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hash, self.height)
    }
}
