//! Header-chain oracle.
//!
//! The oracle ingests headers in any order, keeps the best chain by
//! cumulative work, stages reorganizations and enforces at most one
//! operator checkpoint. Every mutating call follows the same shape:
//!
//! 1. take the write lock,
//! 2. stage all changes into an [`UpdateTransaction`], loading owned copies
//!    of headers by hash and never mutating the database directly,
//! 3. hand the transaction to [`HeaderDatabase::apply`] exactly once.
//!
//! Either everything commits or the call fails with nothing persisted.
//! Tree walks (reconnecting orphans, banning and unbanning subtrees) use
//! explicit worklists keyed by hash.

use std::collections::HashSet;
use std::time::Instant;

use parking_lot::RwLock;

use crate::config::ChainParams;
use crate::metrics::OracleMetrics;
use crate::types::{BlockHash, Header, Position, Status};

use super::error::OracleError;
use super::fork_choice::{ForkChoice, MostWorkForkChoice};
use super::store::HeaderDatabase;
use super::update::UpdateTransaction;

/// Result of [`HeaderOracle::add_header`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImportOutcome {
    /// The header was already known; nothing changed.
    Duplicate,
    /// Stored, waiting for its parent chain.
    Disconnected,
    /// Connected (possibly with previously orphaned descendants).
    Connected {
        /// Best tip after the call.
        best: Position,
        /// Common ancestor with the previous best chain, when the previous
        /// tip was replaced rather than extended.
        reorg_parent: Option<Position>,
    },
}

/// Best-chain oracle over a [`HeaderDatabase`].
///
/// Mutating operations hold the write lock for the whole
/// stage-and-apply sequence; queries only take the read lock.
pub struct HeaderOracle<S, F = MostWorkForkChoice> {
    db: RwLock<S>,
    fork_choice: F,
    metrics: Option<OracleMetrics>,
}

impl<S, F> HeaderOracle<S, F>
where
    S: HeaderDatabase,
    F: ForkChoice,
{
    pub fn new(db: S, fork_choice: F) -> Self {
        Self {
            db: RwLock::new(db),
            fork_choice,
            metrics: None,
        }
    }

    /// Records Prometheus metrics on every commit.
    pub fn with_metrics(mut self, metrics: OracleMetrics) -> Self {
        if let Ok(best) = self.db.get_mut().current_best() {
            metrics.best_height.set(best.height() as i64);
        }
        self.metrics = Some(metrics);
        self
    }

    /// Consumes the oracle, returning the database.
    pub fn into_inner(self) -> S {
        self.db.into_inner()
    }

    // ---------------------------
    // Mutating operations
    // ---------------------------

    /// Adds one header whose validity was already checked upstream.
    ///
    /// Adding a known header is a no-op. A header whose parent chain is
    /// incomplete is stored as disconnected; otherwise it is connected,
    /// any orphans waiting on it are connected too, and the best chain is
    /// updated if one of the new tips wins.
    pub fn add_header(&self, header: Header) -> Result<ImportOutcome, OracleError> {
        let mut db = self.db.write();
        let outcome = self
            .add_header_locked(&mut *db, header)
            .inspect_err(|e| log_failure("add_header", e))?;

        if let Some(metrics) = &self.metrics {
            match outcome {
                ImportOutcome::Duplicate => {}
                ImportOutcome::Disconnected => {
                    metrics.headers_added.inc();
                    metrics.headers_disconnected.inc();
                }
                ImportOutcome::Connected { .. } => metrics.headers_added.inc(),
            }
        }

        Ok(outcome)
    }

    /// Pins `hash` at `height`.
    ///
    /// Every known chain whose header at `height` differs is banned, and
    /// the best chain moves to the best surviving chain if needed. Fails if
    /// a checkpoint is already set.
    pub fn add_checkpoint(&self, height: u64, hash: BlockHash) -> Result<(), OracleError> {
        let mut db = self.db.write();
        self.add_checkpoint_locked(&mut *db, Position::new(height, hash))
            .inspect_err(|e| log_failure("add_checkpoint", e))
    }

    /// Removes the checkpoint, lifts every ban it caused and re-selects the
    /// best chain by pure work.
    ///
    /// On equal work the tip that was best when the checkpoint was added
    /// wins again.
    pub fn delete_checkpoint(&self) -> Result<(), OracleError> {
        let mut db = self.db.write();
        self.delete_checkpoint_locked(&mut *db)
            .inspect_err(|e| log_failure("delete_checkpoint", e))
    }

    /// Installs the configured default checkpoint unless one is already set.
    ///
    /// Returns `true` if a checkpoint was added.
    pub fn apply_default_checkpoint(&self, params: &ChainParams) -> Result<bool, OracleError> {
        let Some(checkpoint) = params.default_checkpoint else {
            return Ok(false);
        };

        let mut db = self.db.write();
        let installed = match db.have_checkpoint() {
            Ok(true) => Ok(false),
            Ok(false) => self.add_checkpoint_locked(&mut *db, checkpoint).map(|()| true),
            Err(e) => Err(e.into()),
        };
        installed.inspect_err(|e| log_failure("apply_default_checkpoint", e))
    }

    // ---------------------------
    // Queries
    // ---------------------------

    /// Position of the best-chain tip.
    pub fn best_chain(&self) -> Result<Position, OracleError> {
        Ok(self.db.read().current_best()?.position())
    }

    pub fn best_hash(&self, height: u64) -> Result<Option<BlockHash>, OracleError> {
        Ok(self.db.read().best_hash(height)?)
    }

    /// Canonical hashes from `start` upward; `limit == 0` means no limit.
    pub fn best_hashes(&self, start: u64, limit: usize) -> Result<Vec<BlockHash>, OracleError> {
        let db = self.db.read();
        let limit = if limit == 0 { usize::MAX } else { limit };
        let mut out = Vec::new();
        let mut height = start;
        while out.len() < limit {
            let Some(hash) = db.best_hash(height)? else {
                break;
            };
            out.push(hash);
            height += 1;
        }
        Ok(out)
    }

    /// The last `count` canonical hashes, newest first.
    pub fn recent_hashes(&self, count: usize) -> Result<Vec<BlockHash>, OracleError> {
        let db = self.db.read();
        let tip = db.current_best()?.height();
        let mut out = Vec::new();
        for height in (0..=tip).rev().take(count) {
            if let Some(hash) = db.best_hash(height)? {
                out.push(hash);
            }
        }
        Ok(out)
    }

    pub fn is_in_best_chain(&self, hash: &BlockHash) -> Result<bool, OracleError> {
        let db = self.db.read();
        match db.try_load_header(hash)? {
            Some(header) if !header.is_disconnected() => {
                Ok(db.best_hash(header.height())? == Some(*hash))
            }
            _ => Ok(false),
        }
    }

    pub fn siblings(&self) -> Result<HashSet<BlockHash>, OracleError> {
        Ok(self.db.read().sibling_hashes()?)
    }

    pub fn get_checkpoint(&self) -> Result<Option<Position>, OracleError> {
        Ok(self.db.read().current_checkpoint()?)
    }

    pub fn header_exists(&self, hash: &BlockHash) -> Result<bool, OracleError> {
        Ok(self.db.read().header_exists(hash)?)
    }

    pub fn load_header(&self, hash: &BlockHash) -> Result<Option<Header>, OracleError> {
        Ok(self.db.read().try_load_header(hash)?)
    }

    /// Walks the ancestry of `position` until it meets the best chain.
    ///
    /// Returns `(common_ancestor, best_tip)`. A position with no known
    /// ancestry degenerates to genesis.
    pub fn common_parent(&self, position: &Position) -> Result<(Position, Position), OracleError> {
        let db = self.db.read();
        let best = db.current_best()?.position();
        let genesis = db
            .best_hash(0)?
            .map(|hash| Position::new(0, hash))
            .ok_or_else(|| OracleError::Corrupted("best chain has no genesis".to_string()))?;

        let mut hash = position.hash;
        loop {
            let Some(header) = db.try_load_header(&hash)? else {
                return Ok((genesis, best));
            };
            if !header.is_disconnected() {
                if db.best_hash(header.height())? == Some(hash) {
                    return Ok((header.position(), best));
                }
                if header.height() == 0 {
                    return Ok((genesis, best));
                }
            }
            hash = header.parent_hash();
        }
    }

    // ---------------------------
    // Staging
    // ---------------------------

    fn add_header_locked(&self, db: &mut S, header: Header) -> Result<ImportOutcome, OracleError> {
        let hash = header.hash();
        if db.header_exists(&hash)? {
            tracing::debug!(%hash, "header already known");
            return Ok(ImportOutcome::Duplicate);
        }

        let mut update = UpdateTransaction::new();
        let outcome = self.stage_header(&*db, &mut update, header)?;
        self.commit(db, update)?;
        Ok(outcome)
    }

    fn stage_header(
        &self,
        db: &S,
        update: &mut UpdateTransaction,
        mut header: Header,
    ) -> Result<ImportOutcome, OracleError> {
        let hash = header.hash();
        let parent_hash = header.parent_hash();

        let parent = match db.try_load_header(&parent_hash)? {
            Some(parent) if !parent.is_disconnected() => parent,
            _ => {
                tracing::debug!(%hash, parent = %parent_hash, "parent unknown, storing disconnected");
                header.mark_disconnected();
                update.disconnect_edge(parent_hash, hash);
                update.stage(header);
                return Ok(ImportOutcome::Disconnected);
            }
        };

        let checkpoint = db.current_checkpoint()?;
        let old_best = db.current_best()?;

        header.inherit_from(&parent, checkpoint.as_ref());
        warn_if_checkpoint_misplaced(&header, checkpoint.as_ref());
        if header.is_banned() {
            tracing::debug!(%hash, height = header.height(), "header conflicts with checkpoint");
        }
        update.stage(header);

        if parent_hash != old_best.hash() && update.is_sibling(db, &parent_hash)? {
            update.remove_sibling(parent_hash);
        }

        let tips = self.connect_children(db, update, hash, checkpoint.as_ref())?;
        let candidates = tips
            .iter()
            .map(|tip| update.load_header(db, tip))
            .collect::<Result<Vec<_>, _>>()?;

        let winner = self
            .fork_choice
            .select(&candidates, checkpoint.as_ref())
            .filter(|best| {
                self.fork_choice
                    .prefers(best, &old_best, checkpoint.as_ref())
            })
            .cloned();

        if let Some(winner) = &winner {
            self.stage_new_tip(db, update, &old_best, winner)?;
        }
        for tip in tips {
            if winner.as_ref().map(Header::hash) != Some(tip) {
                update.add_sibling(tip);
            }
        }

        Ok(ImportOutcome::Connected {
            best: update.tip().unwrap_or_else(|| old_best.position()),
            reorg_parent: if update.is_reorg() {
                update.reorg_parent()
            } else {
                None
            },
        })
    }

    /// Connects every disconnected descendant of `root` and returns the
    /// tips of the resulting subtree (`root` itself if nothing waited on it).
    fn connect_children(
        &self,
        db: &S,
        update: &mut UpdateTransaction,
        root: BlockHash,
        checkpoint: Option<&Position>,
    ) -> Result<Vec<BlockHash>, OracleError> {
        let mut tips = Vec::new();
        let mut stack = vec![root];

        while let Some(parent_hash) = stack.pop() {
            let mut children = db.disconnected_children(&parent_hash)?;
            if children.is_empty() {
                tips.push(parent_hash);
                continue;
            }
            children.sort_by_key(|h| *h.as_bytes());

            let parent = update.load_header(db, &parent_hash)?;
            for child_hash in children {
                let mut child = update.load_header(db, &child_hash)?;
                child.inherit_from(&parent, checkpoint);
                warn_if_checkpoint_misplaced(&child, checkpoint);
                tracing::debug!(hash = %child_hash, height = child.height(), "reconnected header");
                update.stage(child);
                update.connect_edge(parent_hash, child_hash);
                stack.push(child_hash);
            }
        }

        Ok(tips)
    }

    /// Stages `new_tip` as the best tip, including the reorg back to the
    /// common ancestor and sibling bookkeeping for both tips.
    fn stage_new_tip(
        &self,
        db: &S,
        update: &mut UpdateTransaction,
        old_tip: &Header,
        new_tip: &Header,
    ) -> Result<(), OracleError> {
        update.set_tip(new_tip.position());
        let reorg_parent = self.compute_reorg(db, update, new_tip)?;
        let reorg = old_tip.position().is_above(&reorg_parent);
        update.set_reorg_parent(reorg_parent, reorg);

        if reorg_parent != old_tip.position() {
            update.add_sibling(old_tip.hash());
        }
        if update.is_sibling(db, &new_tip.hash())? {
            update.remove_sibling(new_tip.hash());
        }

        if reorg {
            tracing::info!(
                from = %old_tip.position(),
                to = %new_tip.position(),
                ancestor = %reorg_parent,
                "best chain reorganized"
            );
        }
        Ok(())
    }

    /// Walks down from `new_tip`, staging best-chain rewrites until a hash
    /// matches the current best-chain index. Returns that common ancestor.
    fn compute_reorg(
        &self,
        db: &S,
        update: &mut UpdateTransaction,
        new_tip: &Header,
    ) -> Result<Position, OracleError> {
        let mut current = new_tip.clone();
        loop {
            let height = current.height();
            if db.best_hash(height)? == Some(current.hash()) {
                return Ok(current.position());
            }
            if height == 0 {
                return Err(OracleError::GenesisReorg);
            }
            update.add_to_best_chain(height, current.hash());
            current = update.load_header(db, &current.parent_hash())?;
        }
    }

    fn add_checkpoint_locked(&self, db: &mut S, checkpoint: Position) -> Result<(), OracleError> {
        if let Some(existing) = db.current_checkpoint()? {
            return Err(OracleError::CheckpointExists(existing));
        }
        if checkpoint.height == 0 && db.best_hash(0)? != Some(checkpoint.hash) {
            return Err(OracleError::InvalidCheckpoint(
                "checkpoint at height 0 must be genesis",
            ));
        }

        let old_best = db.current_best()?;
        let mut update = UpdateTransaction::new();
        update.add_checkpoint(checkpoint, old_best.position());

        if let Some(mut pinned) = db.try_load_header(&checkpoint.hash)? {
            // A disconnected header has no height yet, so the pin cannot be
            // checked against it.
            if pinned.is_disconnected() {
                return Err(OracleError::InvalidCheckpoint(
                    "header is known but not connected",
                ));
            }
            if pinned.height() != checkpoint.height {
                return Err(OracleError::InvalidCheckpoint(
                    "hash is known at a different height",
                ));
            }
            pinned.set_status(Status::Checkpoint);
            update.stage(pinned);
        }

        let mut tips: Vec<BlockHash> = db.sibling_hashes()?.into_iter().collect();
        tips.sort_by_key(|h| *h.as_bytes());
        tips.push(old_best.hash());
        for tip in tips {
            self.ban_conflicting_path(&*db, &mut update, tip, &checkpoint)?;
        }

        self.reselect_tip(&*db, &mut update, &old_best, Some(&checkpoint), None)?;
        self.commit(db, update)?;
        tracing::info!(%checkpoint, "checkpoint added");
        Ok(())
    }

    /// Bans the path from `tip` down to the checkpoint height if the header
    /// it passes at that height is not the checkpoint.
    fn ban_conflicting_path(
        &self,
        db: &S,
        update: &mut UpdateTransaction,
        tip: BlockHash,
        checkpoint: &Position,
    ) -> Result<(), OracleError> {
        let mut current = update.load_header(db, &tip)?;
        if current.height() < checkpoint.height {
            return Ok(());
        }

        let mut path = Vec::new();
        while current.height() > checkpoint.height {
            path.push(current.hash());
            current = update.load_header(db, &current.parent_hash())?;
        }
        if current.hash() == checkpoint.hash {
            return Ok(());
        }
        path.push(current.hash());

        tracing::debug!(%tip, len = path.len(), "banning chain conflicting with checkpoint");
        for hash in path {
            let mut header = update.load_header(db, &hash)?;
            if !header.is_banned() {
                header.set_status(Status::CheckpointBanned);
                update.stage(header);
            }
        }
        Ok(())
    }

    fn delete_checkpoint_locked(&self, db: &mut S) -> Result<(), OracleError> {
        let checkpoint = db.current_checkpoint()?.ok_or(OracleError::NoCheckpoint)?;
        let prior_tip = db.checkpoint_prior_tip()?;

        let mut update = UpdateTransaction::new();
        update.remove_checkpoint();

        if let Some(mut pinned) = db.try_load_header(&checkpoint.hash)? {
            if pinned.is_checkpoint() {
                pinned.set_status(Status::Normal);
                update.stage(pinned);
            }
        }

        let mut siblings: Vec<BlockHash> = db.sibling_hashes()?.into_iter().collect();
        siblings.sort_by_key(|h| *h.as_bytes());
        let mut unbanned = HashSet::new();
        for sibling in siblings {
            let mut current = update.load_header(&*db, &sibling)?;
            let mut lifted = false;
            while current.is_banned() {
                let parent_hash = current.parent_hash();
                unbanned.insert(current.hash());
                current.set_status(Status::Normal);
                update.stage(current);
                current = update.load_header(&*db, &parent_hash)?;
                lifted = true;
            }
            // Only one checkpoint can be live, so every ban starts exactly
            // at its height. Stopping on a header lifted by an earlier
            // sibling is fine.
            if lifted
                && !unbanned.contains(&current.hash())
                && current.height() + 1 != checkpoint.height
            {
                return Err(OracleError::Corrupted(format!(
                    "ban below {sibling} does not start at checkpoint height {}",
                    checkpoint.height
                )));
            }
        }

        let old_best = db.current_best()?;
        let preferred = prior_tip.map(|tip| tip.hash);
        self.reselect_tip(&*db, &mut update, &old_best, None, preferred)?;
        self.commit(db, update)?;
        tracing::info!(%checkpoint, "checkpoint deleted");
        Ok(())
    }

    /// Re-runs best-tip selection across the current tip (or its last
    /// eligible ancestor) and every staged sibling.
    ///
    /// `preferred` goes first among the candidates, so it wins ties.
    fn reselect_tip(
        &self,
        db: &S,
        update: &mut UpdateTransaction,
        old_best: &Header,
        checkpoint: Option<&Position>,
        preferred: Option<BlockHash>,
    ) -> Result<(), OracleError> {
        let current_tip = update.load_header(db, &old_best.hash())?;

        let mut anchor = current_tip.clone();
        while !self.fork_choice.is_eligible(&anchor) {
            if anchor.height() == 0 {
                return Err(OracleError::NoEligibleTip);
            }
            anchor = update.load_header(db, &anchor.parent_hash())?;
        }

        let mut siblings: Vec<BlockHash> = update.siblings(db)?.into_iter().collect();
        siblings.sort_by_key(|h| *h.as_bytes());
        siblings.retain(|h| *h != anchor.hash());
        let mut candidates = vec![anchor];
        for sibling in siblings {
            candidates.push(update.load_header(db, &sibling)?);
        }
        if let Some(at) = preferred.and_then(|p| candidates.iter().position(|c| c.hash() == p)) {
            let first = candidates.remove(at);
            candidates.insert(0, first);
        }

        let best = self
            .fork_choice
            .select(&candidates, checkpoint)
            .cloned()
            .ok_or(OracleError::NoEligibleTip)?;

        if best.hash() != current_tip.hash() {
            self.stage_new_tip(db, update, &current_tip, &best)?;
        }
        Ok(())
    }

    fn commit(&self, db: &mut S, update: UpdateTransaction) -> Result<(), OracleError> {
        let tip = update.tip();
        let reorg_depth = update.reorg_depth();
        let reorg = update.is_reorg();

        let start = Instant::now();
        db.apply(update)?;
        let elapsed = start.elapsed().as_secs_f64();

        if let Some(metrics) = &self.metrics {
            metrics.apply_seconds.observe(elapsed);
            if let Some(tip) = tip {
                metrics.best_height.set(tip.height as i64);
            }
            if reorg {
                metrics.reorgs.inc();
                metrics.reorg_depth.observe(reorg_depth as f64);
            }
        }

        if let Some(tip) = tip {
            tracing::debug!(%tip, "new best tip");
        }
        Ok(())
    }
}

/// A pinned hash that connects at another height can never be reached.
fn warn_if_checkpoint_misplaced(header: &Header, checkpoint: Option<&Position>) {
    if let Some(cp) = checkpoint {
        if cp.hash == header.hash() && cp.height != header.height() {
            tracing::warn!(
                %cp,
                height = header.height(),
                "checkpoint header connected at a different height"
            );
        }
    }
}

fn log_failure(operation: &str, e: &OracleError) {
    if e.is_fatal() {
        tracing::error!(operation, "header oracle invariant violated: {e}");
    } else {
        tracing::warn!(operation, "header oracle rejected operation: {e}");
    }
}
