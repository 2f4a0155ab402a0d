//! RocksDB-backed header database.
//!
//! This implementation persists every oracle table in a RocksDB instance
//! with dedicated column families:
//!
//! - `"headers"`:      `BlockHash` (32 bytes) -> bincode-encoded [`Header`],
//! - `"best_chain"`:   big-endian `u64` height -> `BlockHash`,
//! - `"siblings"`:     `BlockHash` -> empty value,
//! - `"disconnected"`: parent hash ‖ child hash (64 bytes) -> empty value,
//! - `"meta"`:         fixed keys `"tip"`, `"checkpoint"` and
//!   `"checkpoint_prior_tip"`, each holding an encoded [`Position`].
//!
//! [`HeaderDatabase::apply`] writes one `WriteBatch`, so a transaction is
//! either fully persisted or not at all.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::consensus::store::HeaderDatabase;
use crate::consensus::update::UpdateTransaction;
use crate::types::{BlockHash, HASH_LEN, Header, Position};

use super::StorageError;

const CF_HEADERS: &str = "headers";
const CF_BEST_CHAIN: &str = "best_chain";
const CF_SIBLINGS: &str = "siblings";
const CF_DISCONNECTED: &str = "disconnected";
const CF_META: &str = "meta";

const META_TIP: &[u8] = b"tip";
const META_CHECKPOINT: &[u8] = b"checkpoint";
const META_CHECKPOINT_PRIOR_TIP: &[u8] = b"checkpoint_prior_tip";

/// Configuration for [`RocksDbHeaderDatabase`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/chain-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`HeaderDatabase`].
pub struct RocksDbHeaderDatabase {
    db: DB,
}

impl RocksDbHeaderDatabase {
    /// Opens (or creates) a header database at `cfg.path`.
    ///
    /// A database without a stored tip is seeded with `genesis` as the only
    /// header and best-chain entry. An existing database must already hold
    /// that same genesis at height 0.
    pub fn open(cfg: &RocksDbConfig, genesis: Header) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = [
            "default",
            CF_HEADERS,
            CF_BEST_CHAIN,
            CF_SIBLINGS,
            CF_DISCONNECTED,
            CF_META,
        ]
        .into_iter()
        .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;
        let store = Self { db };

        if store.get_meta(META_TIP)?.is_none() {
            tracing::info!(genesis = %genesis.hash(), path = %cfg.path, "seeding empty header database");
            store.seed_genesis(&genesis)?;
        } else if store.best_hash(0)? != Some(genesis.hash()) {
            return Err(StorageError::Corrupted("stored genesis does not match"));
        }

        Ok(store)
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or(StorageError::MissingColumnFamily(name))
    }

    fn seed_genesis(&self, genesis: &Header) -> Result<(), StorageError> {
        let hash = genesis.hash();
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_HEADERS)?, hash.as_bytes(), encode(genesis)?);
        batch.put_cf(self.cf(CF_BEST_CHAIN)?, height_key(0), hash.as_bytes());
        batch.put_cf(self.cf(CF_META)?, META_TIP, encode(&genesis.position())?);
        self.db.write(batch)?;
        Ok(())
    }

    fn get_meta(&self, key: &[u8]) -> Result<Option<Position>, StorageError> {
        match self.db.get_cf(self.cf(CF_META)?, key)? {
            None => Ok(None),
            Some(bytes) => decode(&bytes).map(Some),
        }
    }

    fn read_header(&self, hash: &BlockHash) -> Result<Option<Header>, StorageError> {
        match self.db.get_cf(self.cf(CF_HEADERS)?, hash.as_bytes())? {
            None => Ok(None),
            Some(bytes) => decode(&bytes).map(Some),
        }
    }

    fn read_best_hash(&self, height: u64) -> Result<Option<BlockHash>, StorageError> {
        match self.db.get_cf(self.cf(CF_BEST_CHAIN)?, height_key(height))? {
            None => Ok(None),
            Some(bytes) => BlockHash::from_slice(&bytes)
                .map(Some)
                .ok_or(StorageError::Corrupted("best-chain hash length")),
        }
    }

    fn read_siblings(&self) -> Result<HashSet<BlockHash>, StorageError> {
        let mut out = HashSet::new();
        for item in self.db.iterator_cf(self.cf(CF_SIBLINGS)?, IteratorMode::Start) {
            let (key, _) = item?;
            let hash =
                BlockHash::from_slice(&key).ok_or(StorageError::Corrupted("sibling key length"))?;
            out.insert(hash);
        }
        Ok(out)
    }

    fn read_disconnected(&self) -> Result<HashMap<BlockHash, HashSet<BlockHash>>, StorageError> {
        let mut out: HashMap<BlockHash, HashSet<BlockHash>> = HashMap::new();
        for item in self
            .db
            .iterator_cf(self.cf(CF_DISCONNECTED)?, IteratorMode::Start)
        {
            let (key, _) = item?;
            let (parent, child) = split_edge_key(&key)?;
            out.entry(parent).or_default().insert(child);
        }
        Ok(out)
    }

    fn read_disconnected_children(&self, parent: &BlockHash) -> Result<Vec<BlockHash>, StorageError> {
        let mode = IteratorMode::From(parent.as_bytes(), Direction::Forward);
        let mut out = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_DISCONNECTED)?, mode) {
            let (key, _) = item?;
            let (edge_parent, child) = split_edge_key(&key)?;
            if edge_parent != *parent {
                break;
            }
            out.push(child);
        }
        Ok(out)
    }

    /// Heights strictly above `height` currently in the best-chain table.
    fn best_chain_keys_above(&self, height: u64) -> Result<Vec<Box<[u8]>>, StorageError> {
        let start = height_key(height.saturating_add(1));
        let mode = IteratorMode::From(&start, Direction::Forward);
        let mut keys = Vec::new();
        for item in self.db.iterator_cf(self.cf(CF_BEST_CHAIN)?, mode) {
            let (key, _) = item?;
            keys.push(key);
        }
        Ok(keys)
    }

    fn build_batch(&self, update: &UpdateTransaction) -> Result<WriteBatch, StorageError> {
        let mut batch = WriteBatch::default();

        let cf_headers = self.cf(CF_HEADERS)?;
        for header in update.staged_headers() {
            batch.put_cf(cf_headers, header.hash().as_bytes(), encode(header)?);
        }

        let cf_disconnected = self.cf(CF_DISCONNECTED)?;
        for (parent, child) in update.edges_disconnected() {
            batch.put_cf(cf_disconnected, edge_key(parent, child), b"");
        }
        for (parent, child) in update.edges_connected() {
            batch.delete_cf(cf_disconnected, edge_key(parent, child));
        }

        let cf_siblings = self.cf(CF_SIBLINGS)?;
        for hash in update.siblings_removed() {
            batch.delete_cf(cf_siblings, hash.as_bytes());
        }
        for hash in update.siblings_added() {
            batch.put_cf(cf_siblings, hash.as_bytes(), b"");
        }

        let cf_best = self.cf(CF_BEST_CHAIN)?;
        let cf_meta = self.cf(CF_META)?;
        if let Some(tip) = update.tip() {
            let staged = update.staged_headers().any(|h| h.hash() == tip.hash);
            if !staged && self.read_header(&tip.hash)?.is_none() {
                return Err(StorageError::MissingHeader(tip.hash));
            }
            for key in self.best_chain_keys_above(tip.height)? {
                batch.delete_cf(cf_best, key);
            }
            batch.put_cf(cf_meta, META_TIP, encode(&tip)?);
        }
        for (height, hash) in update.best_chain_updates() {
            batch.put_cf(cf_best, height_key(height), hash.as_bytes());
        }

        if let Some(checkpoint) = update.checkpoint_change() {
            put_or_delete_meta(&mut batch, cf_meta, META_CHECKPOINT, checkpoint)?;
            put_or_delete_meta(
                &mut batch,
                cf_meta,
                META_CHECKPOINT_PRIOR_TIP,
                update.checkpoint_prior_tip(),
            )?;
        }

        Ok(batch)
    }
}

impl HeaderDatabase for RocksDbHeaderDatabase {
    fn current_best(&self) -> Result<Header, StorageError> {
        let tip = self
            .get_meta(META_TIP)?
            .ok_or(StorageError::Corrupted("no tip recorded"))?;
        self.read_header(&tip.hash)?
            .ok_or(StorageError::MissingHeader(tip.hash))
    }

    fn best_hash(&self, height: u64) -> Result<Option<BlockHash>, StorageError> {
        self.read_best_hash(height)
    }

    fn header_exists(&self, hash: &BlockHash) -> Result<bool, StorageError> {
        let value = self.db.get_pinned_cf(self.cf(CF_HEADERS)?, hash.as_bytes())?;
        Ok(value.is_some())
    }

    fn try_load_header(&self, hash: &BlockHash) -> Result<Option<Header>, StorageError> {
        self.read_header(hash)
    }

    fn sibling_hashes(&self) -> Result<HashSet<BlockHash>, StorageError> {
        self.read_siblings()
    }

    fn disconnected_hashes(&self) -> Result<HashMap<BlockHash, HashSet<BlockHash>>, StorageError> {
        self.read_disconnected()
    }

    fn disconnected_children(&self, parent: &BlockHash) -> Result<Vec<BlockHash>, StorageError> {
        self.read_disconnected_children(parent)
    }

    fn current_checkpoint(&self) -> Result<Option<Position>, StorageError> {
        self.get_meta(META_CHECKPOINT)
    }

    fn checkpoint_prior_tip(&self) -> Result<Option<Position>, StorageError> {
        self.get_meta(META_CHECKPOINT_PRIOR_TIP)
    }

    fn apply(&mut self, update: UpdateTransaction) -> Result<(), StorageError> {
        let batch = self.build_batch(&update)?;
        self.db.write(batch)?;
        Ok(())
    }
}

fn put_or_delete_meta(
    batch: &mut WriteBatch,
    cf: &ColumnFamily,
    key: &[u8],
    value: Option<Position>,
) -> Result<(), StorageError> {
    match value {
        Some(position) => batch.put_cf(cf, key, encode(&position)?),
        None => batch.delete_cf(cf, key),
    }
    Ok(())
}

fn height_key(height: u64) -> [u8; 8] {
    height.to_be_bytes()
}

fn edge_key(parent: &BlockHash, child: &BlockHash) -> [u8; 2 * HASH_LEN] {
    let mut key = [0u8; 2 * HASH_LEN];
    key[..HASH_LEN].copy_from_slice(parent.as_bytes());
    key[HASH_LEN..].copy_from_slice(child.as_bytes());
    key
}

fn split_edge_key(key: &[u8]) -> Result<(BlockHash, BlockHash), StorageError> {
    if key.len() != 2 * HASH_LEN {
        return Err(StorageError::Corrupted("disconnected key length"));
    }
    let (parent, child) = key.split_at(HASH_LEN);
    match (BlockHash::from_slice(parent), BlockHash::from_slice(child)) {
        (Some(parent), Some(child)) => Ok((parent, child)),
        _ => Err(StorageError::Corrupted("disconnected key length")),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StorageError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    let (value, _): (T, usize) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StorageError::Codec(e.to_string()))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{HeaderOracle, MostWorkForkChoice};
    use crate::types::{Hash256, HeaderData};
    use tempfile::TempDir;

    fn data(parent: BlockHash, difficulty: u64, nonce: u64) -> HeaderData {
        HeaderData {
            version: 1,
            parent,
            merkle_root: Hash256([0u8; HASH_LEN]),
            timestamp: 1_700_000_000 + nonce,
            difficulty,
            nonce,
        }
    }

    fn genesis() -> Header {
        Header::genesis(data(BlockHash::ZERO, 1, 0))
    }

    fn config(tmp: &TempDir) -> RocksDbConfig {
        RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        }
    }

    #[test]
    fn open_seeds_genesis_once() {
        let tmp = TempDir::new().expect("create temp dir");
        let g = genesis();

        let db = RocksDbHeaderDatabase::open(&config(&tmp), g.clone()).expect("open RocksDB");
        assert_eq!(db.best_hash(0).expect("read"), Some(g.hash()));
        assert_eq!(db.current_best().expect("tip"), g);
        drop(db);

        let db = RocksDbHeaderDatabase::open(&config(&tmp), g.clone()).expect("reopen RocksDB");
        assert_eq!(db.current_best().expect("tip").hash(), g.hash());
        drop(db);

        let other = Header::genesis(data(BlockHash::ZERO, 1, 42));
        assert!(matches!(
            RocksDbHeaderDatabase::open(&config(&tmp), other),
            Err(StorageError::Corrupted(_))
        ));
    }

    #[test]
    fn oracle_state_survives_reopen() {
        let tmp = TempDir::new().expect("create temp dir");
        let g = genesis();

        let a1 = Header::new(data(g.hash(), 1, 1));
        let a2 = Header::new(data(a1.hash(), 1, 2));
        let fork = Header::new(data(g.hash(), 1, 3));
        let orphan = Header::new(data(BlockHash(Hash256([7u8; HASH_LEN])), 1, 4));

        {
            let db = RocksDbHeaderDatabase::open(&config(&tmp), g.clone()).expect("open RocksDB");
            let oracle = HeaderOracle::new(db, MostWorkForkChoice);
            for header in [&a2, &a1, &fork, &orphan] {
                oracle.add_header(header.clone()).expect("add header");
            }
            oracle.add_checkpoint(1, a1.hash()).expect("checkpoint");
        }

        let db = RocksDbHeaderDatabase::open(&config(&tmp), g.clone()).expect("reopen RocksDB");
        assert_eq!(db.current_best().expect("tip").hash(), a2.hash());
        assert_eq!(db.best_hash(1).expect("read"), Some(a1.hash()));
        assert_eq!(db.best_hash(2).expect("read"), Some(a2.hash()));
        assert_eq!(db.sibling_hashes().expect("read"), HashSet::from([fork.hash()]));
        assert_eq!(
            db.current_checkpoint().expect("read"),
            Some(Position::new(1, a1.hash()))
        );
        assert_eq!(
            db.checkpoint_prior_tip().expect("read"),
            Some(Position::new(2, a2.hash()))
        );
        assert!(db.load_header(&fork.hash()).expect("fork").is_banned());
        assert!(db.header_exists(&orphan.hash()).expect("read"));
        assert_eq!(
            db.disconnected_children(&orphan.parent_hash()).expect("read"),
            vec![orphan.hash()]
        );
        assert!(db.disconnected_children(&g.hash()).expect("read").is_empty());
        assert_eq!(db.disconnected_hashes().expect("read").len(), 1);
    }

    #[test]
    fn new_lower_tip_deletes_stale_best_chain_entries() {
        let tmp = TempDir::new().expect("create temp dir");
        let g = genesis();
        let mut db = RocksDbHeaderDatabase::open(&config(&tmp), g.clone()).expect("open RocksDB");

        let mut a1 = Header::new(data(g.hash(), 1, 1));
        a1.inherit_from(&g, None);
        let mut a2 = Header::new(data(a1.hash(), 1, 2));
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
        update.remove_checkpoint();
        db.apply(update).expect("truncate");

        assert_eq!(db.best_hash(2).expect("read"), None);
        assert_eq!(db.current_best().expect("tip").hash(), a1.hash());
        assert_eq!(db.current_checkpoint().expect("read"), None);
        assert_eq!(db.checkpoint_prior_tip().expect("read"), None);
    }

    #[test]
    fn apply_with_unknown_tip_writes_nothing() {
        let tmp = TempDir::new().expect("create temp dir");
        let g = genesis();
        let mut db = RocksDbHeaderDatabase::open(&config(&tmp), g.clone()).expect("open RocksDB");
        let stray = Header::new(data(g.hash(), 1, 9));

        let mut update = UpdateTransaction::new();
        update.add_sibling(stray.hash());
        update.set_tip(Position::new(1, stray.hash()));
        assert!(matches!(
            db.apply(update),
            Err(StorageError::MissingHeader(_))
        ));
        assert!(db.sibling_hashes().expect("read").is_empty());
        assert_eq!(db.current_best().expect("tip").hash(), g.hash());
    }
}
