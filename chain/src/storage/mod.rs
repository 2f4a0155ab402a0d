//! Storage backends for the header oracle.
//!
//! This module provides concrete implementations of the
//! [`crate::consensus::store::HeaderDatabase`] trait, including:
//!
//! - an in-memory database ([`mem::InMemoryHeaderDatabase`]) suitable for
//!   tests,
//! - a RocksDB-backed database ([`rocksdb::RocksDbHeaderDatabase`]) for
//!   persistent nodes.

pub mod error;
pub mod mem;
pub mod rocksdb;

pub use error::StorageError;
pub use mem::InMemoryHeaderDatabase;
pub use self::rocksdb::{RocksDbConfig, RocksDbHeaderDatabase};
