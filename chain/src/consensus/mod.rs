//! Header-chain consensus: best-chain tracking and checkpoints.
//!
//! This module provides a modular, testable oracle layer consisting of:
//!
//! - a storage abstraction ([`store::HeaderDatabase`]),
//! - a per-call staging object ([`update::UpdateTransaction`]),
//! - pluggable fork-choice rules ([`fork_choice::ForkChoice`]),
//! - the oracle itself ([`oracle::HeaderOracle`]).

pub mod error;
pub mod fork_choice;
pub mod oracle;
pub mod store;
pub mod update;

pub use error::OracleError;
pub use fork_choice::{ForkChoice, MostWorkForkChoice};
pub use oracle::{HeaderOracle, ImportOutcome};
pub use store::HeaderDatabase;
pub use update::UpdateTransaction;
