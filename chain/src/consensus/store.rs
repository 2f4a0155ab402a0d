//! Storage abstraction used by the header oracle.

use std::collections::{HashMap, HashSet};

use crate::storage::StorageError;
use crate::types::{BlockHash, Header, Position};

use super::update::UpdateTransaction;

/// Durable header store consumed by the oracle.
///
/// Implementations can be backed by in-memory maps, RocksDB, etc. Every read
/// reports backend failures instead of guessing, so the oracle never stages
/// changes from a partial view. The only mutation is [`apply`](Self::apply),
/// which must commit every table of an [`UpdateTransaction`] or none of them.
pub trait HeaderDatabase {
    /// Header at the tip of the best chain.
    fn current_best(&self) -> Result<Header, StorageError>;

    /// Canonical hash at `height`, if the best chain is that tall.
    fn best_hash(&self, height: u64) -> Result<Option<BlockHash>, StorageError>;

    fn header_exists(&self, hash: &BlockHash) -> Result<bool, StorageError> {
        Ok(self.try_load_header(hash)?.is_some())
    }

    fn load_header(&self, hash: &BlockHash) -> Result<Header, StorageError> {
        self.try_load_header(hash)?
            .ok_or(StorageError::MissingHeader(*hash))
    }

    fn try_load_header(&self, hash: &BlockHash) -> Result<Option<Header>, StorageError>;

    /// Tips of every known chain that is not the best chain.
    fn sibling_hashes(&self) -> Result<HashSet<BlockHash>, StorageError>;

    /// Multimap from a missing (or itself disconnected) parent to the
    /// children waiting on it.
    fn disconnected_hashes(&self) -> Result<HashMap<BlockHash, HashSet<BlockHash>>, StorageError>;

    /// Children waiting on `parent`.
    fn disconnected_children(&self, parent: &BlockHash) -> Result<Vec<BlockHash>, StorageError> {
        Ok(self
            .disconnected_hashes()?
            .remove(parent)
            .map(|children| children.into_iter().collect())
            .unwrap_or_default())
    }

    fn has_disconnected_children(&self, parent: &BlockHash) -> Result<bool, StorageError> {
        Ok(!self.disconnected_children(parent)?.is_empty())
    }

    fn current_checkpoint(&self) -> Result<Option<Position>, StorageError>;

    fn have_checkpoint(&self) -> Result<bool, StorageError> {
        Ok(self.current_checkpoint()?.is_some())
    }

    /// Best tip recorded when the current checkpoint was added.
    fn checkpoint_prior_tip(&self) -> Result<Option<Position>, StorageError>;

    /// Atomically commits all staged mutations.
    ///
    /// When a new tip is staged, best-chain entries above its height are
    /// dropped before the staged rewrites are written. On error the prior
    /// state must be fully intact.
    fn apply(&mut self, update: UpdateTransaction) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256, HeaderData};

    /// Minimal single-header store; good for checking trait-object use and
    /// the provided methods without a real backend.
    struct GenesisOnly {
        genesis: Header,
        orphans: HashMap<BlockHash, HashSet<BlockHash>>,
    }

    impl GenesisOnly {
        fn new() -> Self {
            let genesis = Header::genesis(HeaderData {
                version: 1,
                parent: BlockHash::ZERO,
                merkle_root: Hash256([0u8; HASH_LEN]),
                timestamp: 0,
                difficulty: 1,
                nonce: 0,
            });
            let mut orphans = HashMap::new();
            orphans.insert(
                BlockHash(Hash256([9u8; HASH_LEN])),
                HashSet::from([BlockHash(Hash256([8u8; HASH_LEN]))]),
            );
            Self { genesis, orphans }
        }
    }

    impl HeaderDatabase for GenesisOnly {
        fn current_best(&self) -> Result<Header, StorageError> {
            Ok(self.genesis.clone())
        }

        fn best_hash(&self, height: u64) -> Result<Option<BlockHash>, StorageError> {
            Ok((height == 0).then(|| self.genesis.hash()))
        }

        fn try_load_header(&self, hash: &BlockHash) -> Result<Option<Header>, StorageError> {
            Ok((*hash == self.genesis.hash()).then(|| self.genesis.clone()))
        }

        fn sibling_hashes(&self) -> Result<HashSet<BlockHash>, StorageError> {
            Ok(HashSet::new())
        }

        fn disconnected_hashes(
            &self,
        ) -> Result<HashMap<BlockHash, HashSet<BlockHash>>, StorageError> {
            Ok(self.orphans.clone())
        }

        fn current_checkpoint(&self) -> Result<Option<Position>, StorageError> {
            Ok(None)
        }

        fn checkpoint_prior_tip(&self) -> Result<Option<Position>, StorageError> {
            Ok(None)
        }

        fn apply(&mut self, _update: UpdateTransaction) -> Result<(), StorageError> {
            Err(StorageError::WriteRejected("read-only"))
        }
    }

    #[test]
    fn header_database_trait_is_object_safe() {
        fn use_trait_object(db: &dyn HeaderDatabase) -> bool {
            db.have_checkpoint().unwrap()
        }

        assert!(!use_trait_object(&GenesisOnly::new()));
    }

    #[test]
    fn provided_methods_follow_required_ones() {
        let db = GenesisOnly::new();
        let genesis = db.genesis.hash();

        assert!(db.header_exists(&genesis).unwrap());
        assert!(db.load_header(&genesis).is_ok());
        assert!(matches!(
            db.load_header(&BlockHash::ZERO),
            Err(StorageError::MissingHeader(_))
        ));

        let parent = BlockHash(Hash256([9u8; HASH_LEN]));
        assert!(db.has_disconnected_children(&parent).unwrap());
        assert_eq!(db.disconnected_children(&parent).unwrap().len(), 1);
        assert!(!db.has_disconnected_children(&genesis).unwrap());
    }
}
