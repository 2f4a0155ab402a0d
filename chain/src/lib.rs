//! Header-chain library crate.
//!
//! This crate tracks the best chain of block headers for a
//! proof-of-work style node:
//!
//! - strongly-typed domain types (`types`),
//! - the header oracle with fork choice, reorgs and checkpoints
//!   (`consensus`),
//! - storage backends (`storage`),
//! - Prometheus-based metrics (`metrics`),
//! - and top-level chain configuration (`config`).
//!
//! Header validity (proof-of-work, timestamps) is checked before a header
//! reaches the oracle; the oracle only orders headers that are already
//! known to be valid.

pub mod config;
pub mod consensus;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-export top-level configuration types.
pub use config::{ChainConfig, ChainParams, MetricsConfig};

// Re-export "core" oracle types and traits.
pub use consensus::{
    ForkChoice, HeaderDatabase, HeaderOracle, ImportOutcome, MostWorkForkChoice, OracleError,
    UpdateTransaction,
};

// Re-export storage backends.
pub use storage::{InMemoryHeaderDatabase, RocksDbConfig, RocksDbHeaderDatabase, StorageError};

// Re-export metrics registry and oracle metrics.
pub use metrics::{MetricsRegistry, OracleMetrics};

// Re-export domain types at the crate root for convenience.
pub use types::*;

/// Type alias for the default fork-choice rule.
pub type DefaultForkChoice = MostWorkForkChoice;

/// Type alias for the default header database backend.
pub type DefaultHeaderDatabase = RocksDbHeaderDatabase;

/// Type alias for the default oracle stack: RocksDB storage with
/// most-work fork choice.
pub type DefaultHeaderOracle = HeaderOracle<DefaultHeaderDatabase, DefaultForkChoice>;
