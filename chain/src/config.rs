//! Top-level configuration for a header-chain node.
//!
//! This module aggregates configuration for:
//!
//! - chain parameters (network name, genesis header, default checkpoint),
//! - storage (RocksDB path and creation flags),
//! - metrics (whether the oracle records Prometheus metrics).
//!
//! Header byte layout and genesis hashes are static per network; higher
//! level binaries pick a [`ChainParams`] and build everything else from
//! [`ChainConfig`].

use crate::storage::RocksDbConfig;
use crate::types::{BlockHash, HASH_LEN, Hash256, Header, HeaderData, Position};

/// Static per-network parameters.
#[derive(Clone, Debug)]
pub struct ChainParams {
    /// Human-readable network name, e.g. `"regtest"`.
    pub network: String,
    /// Fields of the genesis header. Its parent is [`BlockHash::ZERO`].
    pub genesis: HeaderData,
    /// Checkpoint installed at startup when the database has none.
    pub default_checkpoint: Option<Position>,
}

impl ChainParams {
    /// Local test network with a fixed, trivially cheap genesis.
    pub fn regtest() -> Self {
        Self {
            network: "regtest".to_string(),
            genesis: HeaderData {
                version: 1,
                parent: BlockHash::ZERO,
                merkle_root: Hash256([0u8; HASH_LEN]),
                timestamp: 1_296_688_602,
                difficulty: 1,
                nonce: 2,
            },
            default_checkpoint: None,
        }
    }

    /// Genesis header with its chain state (height 0) filled in.
    pub fn genesis_header(&self) -> Header {
        Header::genesis(self.genesis.clone())
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis.compute_hash()
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self::regtest()
    }
}

/// Configuration for oracle metrics.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether the oracle records metrics and `/metrics` is served.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Top-level configuration for a header-chain node.
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub params: ChainParams,
    pub storage: RocksDbConfig,
    pub metrics: MetricsConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regtest_genesis_is_height_zero_with_zero_parent() {
        let params = ChainParams::regtest();
        let genesis = params.genesis_header();

        assert_eq!(genesis.height(), 0);
        assert_eq!(genesis.parent_hash(), BlockHash::ZERO);
        assert_eq!(genesis.hash(), params.genesis_hash());
        assert!(params.default_checkpoint.is_none());
    }
}
