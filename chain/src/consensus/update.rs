//! Staging object for one oracle operation.
//!
//! Every mutation produced while processing a single header or checkpoint
//! command is accumulated here and handed to
//! [`HeaderDatabase::apply`](super::store::HeaderDatabase::apply) in one
//! atomic step. Nothing touches the live database before that point.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::types::{BlockHash, Header, Position};

use super::error::OracleError;
use super::store::HeaderDatabase;

/// Pending changes for one oracle call.
///
/// Headers are cached by hash, so repeated lookups within the same call see
/// earlier staged edits rather than the persisted copy.
#[derive(Debug, Default)]
pub struct UpdateTransaction {
    headers: HashMap<BlockHash, Header>,
    tip: Option<Position>,
    reorg: bool,
    reorg_parent: Option<Position>,
    checkpoint_changed: bool,
    checkpoint: Option<Position>,
    checkpoint_prior_tip: Option<Position>,
    add_siblings: HashSet<BlockHash>,
    remove_siblings: HashSet<BlockHash>,
    connect: HashSet<(BlockHash, BlockHash)>,
    disconnect: HashSet<(BlockHash, BlockHash)>,
    best_chain: BTreeMap<u64, BlockHash>,
}

impl UpdateTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an owned copy of `header`, replacing any earlier copy.
    pub fn stage(&mut self, header: Header) {
        self.headers.insert(header.hash(), header);
    }

    /// Looks up a header, preferring the staged copy.
    pub fn header<S>(&self, db: &S, hash: &BlockHash) -> Result<Option<Header>, OracleError>
    where
        S: HeaderDatabase + ?Sized,
    {
        match self.headers.get(hash) {
            Some(header) => Ok(Some(header.clone())),
            None => Ok(db.try_load_header(hash)?),
        }
    }

    /// Like [`header`](Self::header), but a missing header is an
    /// invariant violation.
    pub fn load_header<S>(&self, db: &S, hash: &BlockHash) -> Result<Header, OracleError>
    where
        S: HeaderDatabase + ?Sized,
    {
        self.header(db, hash)?
            .ok_or_else(|| OracleError::Corrupted(format!("header {hash} must exist")))
    }

    /// Sibling membership as it will be after this transaction applies.
    pub fn is_sibling<S>(&self, db: &S, hash: &BlockHash) -> Result<bool, OracleError>
    where
        S: HeaderDatabase + ?Sized,
    {
        if self.remove_siblings.contains(hash) {
            return Ok(false);
        }
        Ok(self.add_siblings.contains(hash) || db.sibling_hashes()?.contains(hash))
    }

    /// Sibling set as it will be after this transaction applies.
    pub fn siblings<S>(&self, db: &S) -> Result<HashSet<BlockHash>, OracleError>
    where
        S: HeaderDatabase + ?Sized,
    {
        let mut out = db.sibling_hashes()?;
        out.retain(|h| !self.remove_siblings.contains(h));
        out.extend(self.add_siblings.iter().copied());
        Ok(out)
    }

    pub fn set_tip(&mut self, tip: Position) {
        self.tip = Some(tip);
    }

    pub fn set_reorg_parent(&mut self, parent: Position, reorg: bool) {
        self.reorg_parent = Some(parent);
        self.reorg = reorg;
    }

    /// Pins `checkpoint`, remembering the tip that was best before it.
    pub fn add_checkpoint(&mut self, checkpoint: Position, prior_tip: Position) {
        self.checkpoint_changed = true;
        self.checkpoint = Some(checkpoint);
        self.checkpoint_prior_tip = Some(prior_tip);
    }

    pub fn remove_checkpoint(&mut self) {
        self.checkpoint_changed = true;
        self.checkpoint = None;
        self.checkpoint_prior_tip = None;
    }

    pub fn add_sibling(&mut self, hash: BlockHash) {
        self.remove_siblings.remove(&hash);
        self.add_siblings.insert(hash);
    }

    pub fn remove_sibling(&mut self, hash: BlockHash) {
        self.add_siblings.remove(&hash);
        self.remove_siblings.insert(hash);
    }

    /// Records that `child` is now connected through `parent`.
    pub fn connect_edge(&mut self, parent: BlockHash, child: BlockHash) {
        self.disconnect.remove(&(parent, child));
        self.connect.insert((parent, child));
    }

    /// Records that `child` waits on the unknown `parent`.
    pub fn disconnect_edge(&mut self, parent: BlockHash, child: BlockHash) {
        self.connect.remove(&(parent, child));
        self.disconnect.insert((parent, child));
    }

    pub fn add_to_best_chain(&mut self, height: u64, hash: BlockHash) {
        self.best_chain.insert(height, hash);
    }

    pub fn tip(&self) -> Option<Position> {
        self.tip
    }

    pub fn is_reorg(&self) -> bool {
        self.reorg
    }

    pub fn reorg_parent(&self) -> Option<Position> {
        self.reorg_parent
    }

    /// `Some(new)` if the checkpoint changes; `new` itself may be `None`
    /// for a deletion.
    pub fn checkpoint_change(&self) -> Option<Option<Position>> {
        self.checkpoint_changed.then_some(self.checkpoint)
    }

    /// Tip recorded alongside the checkpoint; written whenever the
    /// checkpoint changes.
    pub fn checkpoint_prior_tip(&self) -> Option<Position> {
        self.checkpoint_prior_tip
    }

    pub fn staged_headers(&self) -> impl Iterator<Item = &Header> {
        self.headers.values()
    }

    pub fn siblings_added(&self) -> impl Iterator<Item = &BlockHash> {
        self.add_siblings.iter()
    }

    pub fn siblings_removed(&self) -> impl Iterator<Item = &BlockHash> {
        self.remove_siblings.iter()
    }

    pub fn edges_connected(&self) -> impl Iterator<Item = &(BlockHash, BlockHash)> {
        self.connect.iter()
    }

    pub fn edges_disconnected(&self) -> impl Iterator<Item = &(BlockHash, BlockHash)> {
        self.disconnect.iter()
    }

    /// Best-chain rewrites in ascending height order.
    pub fn best_chain_updates(&self) -> impl Iterator<Item = (u64, BlockHash)> + '_ {
        self.best_chain.iter().map(|(h, hash)| (*h, *hash))
    }

    /// Number of best-chain heights rewritten by a reorg (zero for a plain
    /// extension).
    pub fn reorg_depth(&self) -> u64 {
        match (self.reorg, self.reorg_parent) {
            (true, Some(parent)) => self
                .best_chain
                .keys()
                .filter(|h| **h > parent.height)
                .count() as u64,
            _ => 0,
        }
    }
}
