use std::fmt;

use crate::storage::StorageError;
use crate::types::Position;

/// Errors returned by the header oracle.
///
/// Every variant means the operation committed nothing: staging only ever
/// touches the [`UpdateTransaction`](super::update::UpdateTransaction), and
/// the database is written by a single terminal `apply`.
#[derive(Debug)]
pub enum OracleError {
    /// A reorg would have to replace the genesis block.
    GenesisReorg,
    /// A checkpoint is already set; delete it first.
    CheckpointExists(Position),
    /// There is no checkpoint to delete.
    NoCheckpoint,
    /// The requested checkpoint contradicts known headers.
    InvalidCheckpoint(&'static str),
    /// No chain survives the checkpoint.
    NoEligibleTip,
    /// A header that must exist is missing, or stored state contradicts
    /// itself. Indicates prior corruption; not retried.
    Corrupted(String),
    /// The database refused or failed the commit.
    Storage(StorageError),
}

impl OracleError {
    /// `true` for invariant violations that indicate prior corruption.
    pub fn is_fatal(&self) -> bool {
        matches!(self, OracleError::Corrupted(_))
    }
}

impl From<StorageError> for OracleError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::MissingHeader(hash) => {
                OracleError::Corrupted(format!("header {hash} must exist"))
            }
            StorageError::Corrupted(what) => OracleError::Corrupted(what.to_string()),
            other => OracleError::Storage(other),
        }
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::GenesisReorg => write!(f, "reorg would replace the genesis block"),
            OracleError::CheckpointExists(cp) => write!(f, "checkpoint already set at {cp}"),
            OracleError::NoCheckpoint => write!(f, "no checkpoint is set"),
            OracleError::InvalidCheckpoint(msg) => write!(f, "invalid checkpoint: {msg}"),
            OracleError::NoEligibleTip => write!(f, "no chain is eligible under the checkpoint"),
            OracleError::Corrupted(msg) => write!(f, "corrupted header chain: {msg}"),
            OracleError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for OracleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OracleError::Storage(e) => Some(e),
            _ => None,
        }
    }
}
