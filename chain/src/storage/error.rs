use std::fmt;

use crate::types::BlockHash;

/// Storage-level error type.
#[derive(Debug)]
pub enum StorageError {
    /// Underlying RocksDB error.
    RocksDb(rocksdb::Error),
    /// Required column family was not found.
    MissingColumnFamily(&'static str),
    /// Corrupted or malformed metadata (e.g. tip hash with wrong length).
    Corrupted(&'static str),
    /// A stored header could not be encoded or decoded.
    Codec(String),
    /// A header that must exist is not in the database.
    MissingHeader(BlockHash),
    /// The backend refused the write; nothing was persisted.
    WriteRejected(&'static str),
    /// The backend could not serve a read.
    ReadFailed(&'static str),
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::RocksDb(e)
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::RocksDb(e) => write!(f, "rocksdb: {e}"),
            StorageError::MissingColumnFamily(name) => write!(f, "missing column family {name}"),
            StorageError::Corrupted(what) => write!(f, "corrupted data: {what}"),
            StorageError::Codec(msg) => write!(f, "codec error: {msg}"),
            StorageError::MissingHeader(hash) => write!(f, "header {hash} not found"),
            StorageError::WriteRejected(why) => write!(f, "write rejected: {why}"),
            StorageError::ReadFailed(why) => write!(f, "read failed: {why}"),
        }
    }
}

impl std::error::Error for StorageError {}
