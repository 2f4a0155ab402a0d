//! In-memory header database.
//!
//! This implementation is useful for unit tests, benchmarks, and small
//! devnets. All tables live in ordinary collections; `apply` checks the
//! transaction first and only then mutates, so a rejected transaction
//! leaves every table untouched.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::consensus::store::HeaderDatabase;
use crate::consensus::update::UpdateTransaction;
use crate::types::{BlockHash, Header, Position};

use super::StorageError;

/// In-memory implementation of [`HeaderDatabase`].
#[derive(Clone, Debug)]
pub struct InMemoryHeaderDatabase {
    headers: HashMap<BlockHash, Header>,
    best_chain: BTreeMap<u64, BlockHash>,
    siblings: HashSet<BlockHash>,
    disconnected: HashMap<BlockHash, HashSet<BlockHash>>,
    checkpoint: Option<Position>,
    checkpoint_prior_tip: Option<Position>,
    #[cfg(test)]
    faults: Faults,
}

/// Failures injected by tests.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
struct Faults {
    fail_next_apply: bool,
    unreadable: HashSet<BlockHash>,
    unreadable_siblings: bool,
}

impl InMemoryHeaderDatabase {
    /// Creates a database holding only `genesis`, which is also the tip.
    pub fn new(genesis: Header) -> Self {
        let hash = genesis.hash();
        let mut headers = HashMap::new();
        headers.insert(hash, genesis);
        let mut best_chain = BTreeMap::new();
        best_chain.insert(0, hash);

        Self {
            headers,
            best_chain,
            siblings: HashSet::new(),
            disconnected: HashMap::new(),
            checkpoint: None,
            checkpoint_prior_tip: None,
            #[cfg(test)]
            faults: Faults::default(),
        }
    }

    /// Makes the next `apply` fail without touching any table.
    #[cfg(test)]
    pub(crate) fn fail_next_apply(&mut self) {
        self.faults.fail_next_apply = true;
    }

    /// Makes every lookup of `hash` fail until the faults are cleared.
    #[cfg(test)]
    pub(crate) fn fail_reads_of(&mut self, hash: BlockHash) {
        self.faults.unreadable.insert(hash);
    }

    #[cfg(test)]
    pub(crate) fn fail_sibling_reads(&mut self) {
        self.faults.unreadable_siblings = true;
    }

    #[cfg(test)]
    pub(crate) fn clear_faults(&mut self) {
        self.faults = Faults::default();
    }

    #[cfg(test)]
    fn take_injected_failure(&mut self) -> bool {
        std::mem::take(&mut self.faults.fail_next_apply)
    }

    #[cfg(not(test))]
    fn take_injected_failure(&mut self) -> bool {
        false
    }

    #[cfg(test)]
    fn check_header_read(&self, hash: &BlockHash) -> Result<(), StorageError> {
        if self.faults.unreadable.contains(hash) {
            return Err(StorageError::ReadFailed("injected header read failure"));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_header_read(&self, _hash: &BlockHash) -> Result<(), StorageError> {
        Ok(())
    }

    #[cfg(test)]
    fn check_sibling_read(&self) -> Result<(), StorageError> {
        if self.faults.unreadable_siblings {
            return Err(StorageError::ReadFailed("injected sibling read failure"));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_sibling_read(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl HeaderDatabase for InMemoryHeaderDatabase {
    fn current_best(&self) -> Result<Header, StorageError> {
        let (_, hash) = self
            .best_chain
            .last_key_value()
            .ok_or(StorageError::Corrupted("empty best chain"))?;
        self.load_header(hash)
    }

    fn best_hash(&self, height: u64) -> Result<Option<BlockHash>, StorageError> {
        Ok(self.best_chain.get(&height).copied())
    }

    fn header_exists(&self, hash: &BlockHash) -> Result<bool, StorageError> {
        self.check_header_read(hash)?;
        Ok(self.headers.contains_key(hash))
    }

    fn try_load_header(&self, hash: &BlockHash) -> Result<Option<Header>, StorageError> {
        self.check_header_read(hash)?;
        Ok(self.headers.get(hash).cloned())
    }

    fn sibling_hashes(&self) -> Result<HashSet<BlockHash>, StorageError> {
        self.check_sibling_read()?;
        Ok(self.siblings.clone())
    }

    fn disconnected_hashes(&self) -> Result<HashMap<BlockHash, HashSet<BlockHash>>, StorageError> {
        Ok(self.disconnected.clone())
    }

    fn disconnected_children(&self, parent: &BlockHash) -> Result<Vec<BlockHash>, StorageError> {
        Ok(self
            .disconnected
            .get(parent)
            .map(|children| children.iter().copied().collect())
            .unwrap_or_default())
    }

    fn has_disconnected_children(&self, parent: &BlockHash) -> Result<bool, StorageError> {
        Ok(self
            .disconnected
            .get(parent)
            .is_some_and(|children| !children.is_empty()))
    }

    fn current_checkpoint(&self) -> Result<Option<Position>, StorageError> {
        Ok(self.checkpoint)
    }

    fn checkpoint_prior_tip(&self) -> Result<Option<Position>, StorageError> {
        Ok(self.checkpoint_prior_tip)
    }

    fn apply(&mut self, update: UpdateTransaction) -> Result<(), StorageError> {
        if self.take_injected_failure() {
            return Err(StorageError::WriteRejected("injected failure"));
        }

        if let Some(tip) = update.tip() {
            let staged = update.staged_headers().any(|h| h.hash() == tip.hash);
            if !staged && !self.headers.contains_key(&tip.hash) {
                return Err(StorageError::MissingHeader(tip.hash));
            }
        }

        for header in update.staged_headers() {
            self.headers.insert(header.hash(), header.clone());
        }

        for (parent, child) in update.edges_disconnected() {
            self.disconnected.entry(*parent).or_default().insert(*child);
        }
        for (parent, child) in update.edges_connected() {
            if let Some(children) = self.disconnected.get_mut(parent) {
                children.remove(child);
                if children.is_empty() {
                    self.disconnected.remove(parent);
                }
            }
        }

        for hash in update.siblings_removed() {
            self.siblings.remove(hash);
        }
        self.siblings.extend(update.siblings_added().copied());

        if let Some(tip) = update.tip() {
            self.best_chain.retain(|height, _| *height <= tip.height);
        }
        for (height, hash) in update.best_chain_updates() {
            self.best_chain.insert(height, hash);
        }

        if let Some(checkpoint) = update.checkpoint_change() {
            self.checkpoint = checkpoint;
            self.checkpoint_prior_tip = update.checkpoint_prior_tip();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HASH_LEN, Hash256, HeaderData};

    fn header(parent: BlockHash, nonce: u64) -> Header {
        Header::new(HeaderData {
            version: 1,
            parent,
            merkle_root: Hash256([0u8; HASH_LEN]),
            timestamp: 1_700_000_000 + nonce,
            difficulty: 1,
            nonce,
        })
    }

    fn genesis() -> Header {
        Header::genesis(header(BlockHash::ZERO, 0).data().clone())
    }

    #[test]
    fn new_database_is_seeded_with_genesis() {
        let g = genesis();
        let db = InMemoryHeaderDatabase::new(g.clone());

        assert_eq!(db.headers.len(), 1);
        assert_eq!(db.best_hash(0).unwrap(), Some(g.hash()));
        assert_eq!(db.current_best().expect("tip").hash(), g.hash());
        assert!(!db.have_checkpoint().unwrap());
    }

    #[test]
    fn apply_writes_every_table() {
        let g = genesis();
        let mut db = InMemoryHeaderDatabase::new(g.clone());

        let mut child = header(g.hash(), 1);
        child.inherit_from(&g, None);
        let orphan = header(BlockHash(Hash256([9u8; HASH_LEN])), 2);
        let cp = Position::new(1, child.hash());

        let mut update = UpdateTransaction::new();
        update.stage(child.clone());
        update.stage(orphan.clone());
        update.disconnect_edge(orphan.parent_hash(), orphan.hash());
        update.set_tip(child.position());
        update.add_to_best_chain(1, child.hash());
        update.add_sibling(BlockHash(Hash256([5u8; HASH_LEN])));
        update.add_checkpoint(cp, g.position());
        db.apply(update).expect("apply");

        assert_eq!(db.current_best().expect("tip").hash(), child.hash());
        assert!(db.has_disconnected_children(&orphan.parent_hash()).unwrap());
        assert_eq!(db.sibling_hashes().unwrap().len(), 1);
        assert_eq!(db.current_checkpoint().unwrap(), Some(cp));
        assert_eq!(db.checkpoint_prior_tip().unwrap(), Some(g.position()));

        let mut update = UpdateTransaction::new();
        update.remove_checkpoint();
        db.apply(update).expect("remove checkpoint");
        assert_eq!(db.current_checkpoint().unwrap(), None);
        assert_eq!(db.checkpoint_prior_tip().unwrap(), None);
    }

    #[test]
    fn new_lower_tip_truncates_best_chain() {
        let g = genesis();
        let mut db = InMemoryHeaderDatabase::new(g.clone());

        let mut a1 = header(g.hash(), 1);
        a1.inherit_from(&g, None);
        let mut a2 = header(a1.hash(), 2);
        a2.inherit_from(&a1, None);

        let mut update = UpdateTransaction::new();
        update.stage(a1.clone());
        update.stage(a2.clone());
        update.set_tip(a2.position());
        update.add_to_best_chain(1, a1.hash());
        update.add_to_best_chain(2, a2.hash());
        db.apply(update).expect("extend");

        let mut update = UpdateTransaction::new();
        update.set_tip(a1.position());
        db.apply(update).expect("truncate");

        assert_eq!(db.best_hash(2).unwrap(), None);
        assert_eq!(db.current_best().expect("tip").hash(), a1.hash());
    }

    #[test]
    fn rejected_apply_leaves_tables_untouched() {
        let g = genesis();
        let mut db = InMemoryHeaderDatabase::new(g.clone());
        let stray = header(g.hash(), 7);

        let mut update = UpdateTransaction::new();
        update.add_sibling(stray.hash());
        update.set_tip(Position::new(1, stray.hash()));
        assert!(matches!(
            db.apply(update),
            Err(StorageError::MissingHeader(_))
        ));
        assert!(db.sibling_hashes().unwrap().is_empty());

        let mut update = UpdateTransaction::new();
        update.stage(stray.clone());
        db.fail_next_apply();
        assert!(db.apply(update).is_err());
        assert!(!db.header_exists(&stray.hash()).unwrap());
    }

    #[test]
    fn injected_read_faults_surface_as_errors() {
        let g = genesis();
        let mut db = InMemoryHeaderDatabase::new(g.clone());

        db.fail_reads_of(g.hash());
        db.fail_sibling_reads();
        assert!(matches!(
            db.try_load_header(&g.hash()),
            Err(StorageError::ReadFailed(_))
        ));
        assert!(db.header_exists(&g.hash()).is_err());
        assert!(db.sibling_hashes().is_err());

        db.clear_faults();
        assert!(db.header_exists(&g.hash()).unwrap());
        assert!(db.sibling_hashes().unwrap().is_empty());
    }
}
