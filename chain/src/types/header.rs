//! Block headers and their computed chain state.
//!
//! A [`Header`] has two halves:
//!
//! - an immutable identity ([`HeaderData`] plus its cached [`BlockHash`]),
//! - a mutable [`ChainState`] (height, cumulative work, status) that the
//!   oracle derives by inheritance from the parent once the parent is known.
//!
//! Serialization is done with **bincode 2** using the `serde` integration
//! and an explicit `standard()` config; the same canonical encoding is used
//! for hashing and for persistence.

use serde::{Deserialize, Serialize};

use super::{BlockHash, Hash256, Position, Work};

/// Height-independent header fields as received from peers.
///
/// Validity of these fields (proof-of-work, timestamps) is checked upstream
/// before a header reaches the oracle.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HeaderData {
    pub version: u32,
    /// Hash of the parent header.
    pub parent: BlockHash,
    pub merkle_root: Hash256,
    /// Seconds since Unix epoch.
    pub timestamp: u64,
    /// Difficulty claimed (and already verified) for this header. This is
    /// the header's intrinsic contribution to cumulative work.
    pub difficulty: u64,
    pub nonce: u64,
}

impl HeaderData {
    /// Returns the canonical byte representation of these fields.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails. This is considered a programming error,
    /// because all fields are plain serializable values.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("HeaderData should always be serializable with bincode 2 + serde")
    }

    /// Computes the BLAKE3-256 identity of this header.
    pub fn compute_hash(&self) -> BlockHash {
        BlockHash(Hash256::compute(&self.canonical_bytes()))
    }
}

/// Best-chain eligibility of a header.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// Connected back to genesis and eligible.
    Normal,
    /// The header pinned by the active checkpoint.
    Checkpoint,
    /// This header, or an ancestor, conflicts with the active checkpoint.
    CheckpointBanned,
    /// The parent chain back to genesis is not known yet; height and work
    /// are meaningless until the header is connected.
    Disconnected,
}

/// Chain state derived from the parent.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    pub height: u64,
    pub work: Work,
    pub status: Status,
}

impl ChainState {
    const DISCONNECTED: ChainState = ChainState {
        height: 0,
        work: Work::ZERO,
        status: Status::Disconnected,
    };
}

/// Block header with its chain state.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Header {
    data: HeaderData,
    hash: BlockHash,
    state: ChainState,
}

impl Header {
    /// Wraps freshly received header fields. The chain state stays
    /// `Disconnected` until the oracle connects the header.
    pub fn new(data: HeaderData) -> Self {
        let hash = data.compute_hash();
        Self {
            data,
            hash,
            state: ChainState::DISCONNECTED,
        }
    }

    /// Builds the genesis header: height 0, work equal to its own
    /// intrinsic work.
    pub fn genesis(data: HeaderData) -> Self {
        let mut header = Self::new(data);
        header.state = ChainState {
            height: 0,
            work: header.intrinsic_work(),
            status: Status::Normal,
        };
        header
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }

    pub fn parent_hash(&self) -> BlockHash {
        self.data.parent
    }

    pub fn data(&self) -> &HeaderData {
        &self.data
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn height(&self) -> u64 {
        self.state.height
    }

    pub fn work(&self) -> Work {
        self.state.work
    }

    pub fn status(&self) -> Status {
        self.state.status
    }

    pub fn position(&self) -> Position {
        Position::new(self.state.height, self.hash)
    }

    /// Work contributed by this header alone. Floored at 1 so a child
    /// always out-works its parent.
    pub fn intrinsic_work(&self) -> Work {
        Work(u128::from(self.data.difficulty.max(1)))
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.status == Status::Disconnected
    }

    pub fn is_banned(&self) -> bool {
        self.state.status == Status::CheckpointBanned
    }

    pub fn is_checkpoint(&self) -> bool {
        self.state.status == Status::Checkpoint
    }

    /// Derives height, work and status from a connected parent.
    ///
    /// A banned parent always produces a banned child. Otherwise, at the
    /// checkpoint height the header is either the checkpoint itself or
    /// banned; everywhere else it is `Normal`.
    pub fn inherit_from(&mut self, parent: &Header, checkpoint: Option<&Position>) {
        debug_assert!(!parent.is_disconnected());
        debug_assert_eq!(parent.hash, self.data.parent);

        let height = parent.height() + 1;
        let status = if parent.is_banned() {
            Status::CheckpointBanned
        } else {
            match checkpoint {
                Some(cp) if cp.height == height && cp.hash == self.hash => Status::Checkpoint,
                Some(cp) if cp.height == height => Status::CheckpointBanned,
                _ => Status::Normal,
            }
        };

        self.state = ChainState {
            height,
            work: parent.work() + self.intrinsic_work(),
            status,
        };
    }

    /// Resets the chain state to `Disconnected`.
    pub fn mark_disconnected(&mut self) {
        self.state = ChainState::DISCONNECTED;
    }

    /// Overrides the status of a connected header. Used by checkpoint
    /// add/delete to (un)ban existing subtrees.
    pub(crate) fn set_status(&mut self, status: Status) {
        debug_assert!(!self.is_disconnected());
        debug_assert_ne!(status, Status::Disconnected);
        self.state.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HASH_LEN;

    fn data(parent: BlockHash, difficulty: u64, nonce: u64) -> HeaderData {
        HeaderData {
            version: 1,
            parent,
            merkle_root: Hash256([7u8; HASH_LEN]),
            timestamp: 1_700_000_000 + nonce,
            difficulty,
            nonce,
        }
    }

    #[test]
    fn header_hash_is_deterministic_and_nonce_sensitive() {
        let a = data(BlockHash::ZERO, 1, 0);
        let b = data(BlockHash::ZERO, 1, 1);

        assert_eq!(a.compute_hash(), a.clone().compute_hash());
        assert_ne!(a.compute_hash(), b.compute_hash());
        assert_eq!(Header::new(a.clone()).hash(), a.compute_hash());
    }

    #[test]
    fn new_headers_start_disconnected() {
        let header = Header::new(data(BlockHash::ZERO, 5, 0));
        assert!(header.is_disconnected());
        assert_eq!(header.work(), Work::ZERO);
    }

    #[test]
    fn child_inherits_height_and_work() {
        let genesis = Header::genesis(data(BlockHash::ZERO, 3, 0));
        let mut child = Header::new(data(genesis.hash(), 4, 1));
        child.inherit_from(&genesis, None);

        assert_eq!(genesis.work(), Work(3));
        assert_eq!(child.height(), 1);
        assert_eq!(child.work(), Work(7));
        assert_eq!(child.status(), Status::Normal);
    }

    #[test]
    fn zero_difficulty_still_adds_work() {
        let genesis = Header::genesis(data(BlockHash::ZERO, 0, 0));
        let mut child = Header::new(data(genesis.hash(), 0, 1));
        child.inherit_from(&genesis, None);

        assert!(child.work() > genesis.work());
    }

    #[test]
    fn checkpoint_height_decides_status() {
        let genesis = Header::genesis(data(BlockHash::ZERO, 1, 0));
        let mut good = Header::new(data(genesis.hash(), 1, 1));
        let mut bad = Header::new(data(genesis.hash(), 1, 2));
        let cp = Position::new(1, good.hash());

        good.inherit_from(&genesis, Some(&cp));
        bad.inherit_from(&genesis, Some(&cp));
        assert_eq!(good.status(), Status::Checkpoint);
        assert_eq!(bad.status(), Status::CheckpointBanned);

        let mut after_good = Header::new(data(good.hash(), 1, 3));
        let mut after_bad = Header::new(data(bad.hash(), 1, 4));
        after_good.inherit_from(&good, Some(&cp));
        after_bad.inherit_from(&bad, Some(&cp));
        assert_eq!(after_good.status(), Status::Normal);
        assert_eq!(after_bad.status(), Status::CheckpointBanned);
    }
}
