//! API gateway configuration.
//!
//! The gateway binds one HTTP listener. Chain parameters and storage come
//! from `header_chain::ChainConfig`; the database path can be overridden
//! with `CHAIN_DB_PATH`.

use std::net::SocketAddr;

use header_chain::ChainConfig;

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
        }
    }
}

impl ApiConfig {
    /// Defaults, with `API_LISTEN_ADDR` taking precedence when set.
    pub fn from_env() -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Ok(addr) = std::env::var("API_LISTEN_ADDR") {
            cfg.listen_addr = addr
                .parse()
                .map_err(|e| format!("invalid API_LISTEN_ADDR {addr:?}: {e}"))?;
        }
        Ok(cfg)
    }
}

/// Chain defaults with the storage path taken from `CHAIN_DB_PATH` when set.
pub fn chain_config_from_env() -> ChainConfig {
    let mut cfg = ChainConfig::default();
    if let Ok(path) = std::env::var("CHAIN_DB_PATH") {
        cfg.storage.path = path;
    }
    cfg
}
