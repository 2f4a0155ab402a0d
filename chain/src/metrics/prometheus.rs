//! Prometheus-backed oracle metrics.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed oracle metrics. Exposition over
//! HTTP is left to the embedding binary, which serves
//! [`MetricsRegistry::gather_text`].

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Header-oracle Prometheus metrics.
///
/// These are registered into a [`Registry`] and updated by
/// [`HeaderOracle`](crate::consensus::HeaderOracle) when it is built
/// `with_metrics`.
#[derive(Clone)]
pub struct OracleMetrics {
    /// Headers accepted into the database (connected or not).
    pub headers_added: IntCounter,
    /// Headers stored while their parent chain is incomplete.
    pub headers_disconnected: IntCounter,
    /// Best-chain reorganizations committed.
    pub reorgs: IntCounter,
    /// Heights rewritten per reorg.
    pub reorg_depth: Histogram,
    /// Height of the current best tip.
    pub best_height: IntGauge,
    /// Latency of `HeaderDatabase::apply`, in seconds.
    pub apply_seconds: Histogram,
}

impl OracleMetrics {
    /// Registers oracle metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let headers_added = IntCounter::with_opts(Opts::new(
            "oracle_headers_added_total",
            "Total number of headers accepted by the oracle",
        ))?;
        registry.register(Box::new(headers_added.clone()))?;

        let headers_disconnected = IntCounter::with_opts(Opts::new(
            "oracle_headers_disconnected_total",
            "Total number of headers stored without a known parent chain",
        ))?;
        registry.register(Box::new(headers_disconnected.clone()))?;

        let reorgs = IntCounter::with_opts(Opts::new(
            "oracle_reorgs_total",
            "Total number of best-chain reorganizations",
        ))?;
        registry.register(Box::new(reorgs.clone()))?;

        let reorg_depth = Histogram::with_opts(
            HistogramOpts::new(
                "oracle_reorg_depth",
                "Number of best-chain heights rewritten by a reorg",
            )
            .buckets(vec![1.0, 2.0, 3.0, 6.0, 12.0, 25.0, 50.0, 100.0, 500.0]),
        )?;
        registry.register(Box::new(reorg_depth.clone()))?;

        let best_height = IntGauge::with_opts(Opts::new(
            "oracle_best_height",
            "Height of the current best-chain tip",
        ))?;
        registry.register(Box::new(best_height.clone()))?;

        let apply_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "oracle_apply_seconds",
                "Time to commit one update transaction in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )?;
        registry.register(Box::new(apply_seconds.clone()))?;

        Ok(Self {
            headers_added,
            headers_disconnected,
            reorgs,
            reorg_depth,
            best_height,
            apply_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the oracle metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an `Arc` and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub oracle: OracleMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the oracle metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let oracle = OracleMetrics::register(&registry)?;
        Ok(Self { registry, oracle })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
