use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::state::SharedState;

/// `GET /metrics`
///
/// Prometheus text exposition of the oracle metrics, or 404 when metrics
/// are disabled.
pub async fn metrics(State(state): State<SharedState>) -> Response {
    match &state.metrics {
        Some(registry) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            registry.gather_text(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
