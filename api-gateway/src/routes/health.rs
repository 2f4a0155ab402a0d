use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Simple health-check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub network: String,
    pub best_height: Option<u64>,
}

/// `GET /health`
///
/// Returns liveness plus the network name and best height. A database that
/// cannot report its tip yields 503.
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let network = state.params.network.clone();
    match state.oracle.best_chain() {
        Ok(best) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                network,
                best_height: Some(best.height),
            }),
        ),
        Err(e) => {
            tracing::error!("health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    network,
                    best_height: None,
                }),
            )
        }
    }
}
