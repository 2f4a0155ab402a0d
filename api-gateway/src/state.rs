//! Shared application state.

use std::sync::Arc;

use header_chain::{ChainParams, DefaultHeaderOracle, MetricsRegistry};

/// Shared state held by request handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor. The oracle does its own locking, so handlers only
/// need a shared reference.
pub struct AppState {
    /// Embedded header oracle (RocksDB + most-work fork choice).
    pub oracle: DefaultHeaderOracle,
    /// Network parameters the oracle was opened with.
    pub params: ChainParams,
    /// Metrics registry; `None` when metrics are disabled.
    pub metrics: Option<Arc<MetricsRegistry>>,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
