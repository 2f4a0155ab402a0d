//! Metrics and instrumentation for the header oracle.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use header_chain::metrics::MetricsRegistry;
//!
//! let registry = MetricsRegistry::new()?;
//! let oracle = HeaderOracle::new(db, MostWorkForkChoice)
//!     .with_metrics(registry.oracle.clone());
//!
//! // Serve this from a `/metrics` route:
//! let body = registry.gather_text();
//! ```

pub mod prometheus;

pub use self::prometheus::{MetricsRegistry, OracleMetrics};
