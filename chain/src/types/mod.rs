//! Core domain types used by the header chain.
//!
//! This module defines strongly-typed hashes, cumulative work, chain
//! positions and the header type itself. As in the rest of the crate, the
//! goal is to avoid "naked" byte buffers and integers in public APIs and to
//! use domain-specific newtypes instead.

use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Block headers and their computed chain state.
pub mod header;
/// `(height, hash)` positions in a chain.
pub mod position;

pub use header::{ChainState, Header, HeaderData, Status};
pub use position::Position;

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (BLAKE3-256).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes a new [`Hash256`] as the BLAKE3-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let h = blake3::hash(data);
        Hash256(*h.as_bytes())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Parses a hex string of exactly [`HASH_LEN`] bytes.
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        let bytes = hex::decode(hex_str).ok()?;
        let arr: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Hash256(arr))
    }
}

/// Strongly-typed block hash.
///
/// This is the identity of a [`Header`]: a BLAKE3-256 digest over the
/// canonical bincode-2 serialization of its [`HeaderData`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl BlockHash {
    /// All-zero hash, used as the parent of genesis.
    pub const ZERO: BlockHash = BlockHash(Hash256([0u8; HASH_LEN]));

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        self.0.as_bytes()
    }

    /// Builds a hash from a raw byte slice, rejecting wrong lengths.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(BlockHash(Hash256(arr)))
    }

    pub fn from_hex(hex_str: &str) -> Option<Self> {
        Hash256::from_hex(hex_str).map(BlockHash)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Cumulative proof-of-work.
///
/// Work is purely additive: a header's work is its parent's work plus its
/// own intrinsic work. Comparisons between competing tips are always made
/// on this value.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct Work(pub u128);

impl Work {
    pub const ZERO: Work = Work(0);
}

impl Add for Work {
    type Output = Work;

    fn add(self, rhs: Work) -> Work {
        Work(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_hex_roundtrip_rejects_bad_lengths() {
        let hash = BlockHash(Hash256::compute(b"header"));
        let parsed = BlockHash::from_hex(&hash.to_hex()).expect("valid hex");
        assert_eq!(parsed, hash);

        assert!(BlockHash::from_hex("abcd").is_none());
        assert!(BlockHash::from_hex("zz").is_none());
        assert!(BlockHash::from_slice(&[0u8; 31]).is_none());
    }

    #[test]
    fn work_addition_saturates() {
        assert_eq!(Work(2) + Work(3), Work(5));
        assert_eq!(Work(u128::MAX) + Work(1), Work(u128::MAX));
    }
}
