// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `header-chain` crate:
//!
//! - `GET /health`
//! - `GET /chain/best`, `/chain/hash/{height}`, `/chain/hashes`,
//!   `/chain/siblings`, `/chain/common-parent/{height}/{hash}`
//! - `GET /headers/{hash}`, `POST /headers`
//! - `GET|PUT|DELETE /checkpoint`
//! - `GET /metrics`
//!
//! It embeds a `DefaultHeaderOracle` (RocksDB-backed) and serves its
//! Prometheus metrics from the same listener.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use config::{ApiConfig, chain_config_from_env};
use header_chain::{
    DefaultForkChoice, DefaultHeaderOracle, HeaderOracle, MetricsRegistry, RocksDbHeaderDatabase,
};
use routes::{chain, checkpoint, headers, health, metrics};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("api_gateway=info,header_chain=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env()?;
    let chain_cfg = chain_config_from_env();

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics_registry = if chain_cfg.metrics.enabled {
        Some(Arc::new(MetricsRegistry::new().map_err(|e| {
            format!("failed to initialise metrics registry: {e}")
        })?))
    } else {
        None
    };

    // ---------------------------
    // Storage + oracle
    // ---------------------------

    let db = RocksDbHeaderDatabase::open(&chain_cfg.storage, chain_cfg.params.genesis_header())
        .map_err(|e| {
            format!(
                "failed to open RocksDB store at {}: {e}",
                chain_cfg.storage.path
            )
        })?;

    let mut oracle: DefaultHeaderOracle = HeaderOracle::new(db, DefaultForkChoice::default());
    if let Some(registry) = &metrics_registry {
        oracle = oracle.with_metrics(registry.oracle.clone());
    }

    if oracle
        .apply_default_checkpoint(&chain_cfg.params)
        .map_err(|e| format!("failed to apply default checkpoint: {e}"))?
    {
        tracing::info!("default checkpoint installed");
    }

    let best = oracle
        .best_chain()
        .map_err(|e| format!("failed to read best chain: {e}"))?;
    tracing::info!(
        network = %chain_cfg.params.network,
        %best,
        "header oracle ready"
    );

    let app_state: SharedState = Arc::new(AppState {
        oracle,
        params: chain_cfg.params.clone(),
        metrics: metrics_registry,
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/chain/best", get(chain::best))
        .route("/chain/hash/{height}", get(chain::hash_at))
        .route("/chain/hashes", get(chain::hashes))
        .route("/chain/siblings", get(chain::siblings))
        .route(
            "/chain/common-parent/{height}/{hash}",
            get(chain::common_parent),
        )
        .route("/headers", post(headers::submit_header))
        .route("/headers/{hash}", get(headers::get_header))
        .route(
            "/checkpoint",
            get(checkpoint::get_checkpoint)
                .put(checkpoint::put_checkpoint)
                .delete(checkpoint::delete_checkpoint),
        )
        .route("/metrics", get(metrics::metrics))
        .with_state(app_state);

    // ---------------------------
    // axum 0.8 server
    // ---------------------------

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
