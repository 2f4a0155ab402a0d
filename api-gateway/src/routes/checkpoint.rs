//! Operator checkpoint management.

use axum::{Json, extract::State, http::StatusCode};

use header_chain::Position;

use super::{ApiError, PositionDto, oracle_error};
use crate::state::SharedState;

/// `GET /checkpoint`
///
/// Returns `null` when no checkpoint is set.
pub async fn get_checkpoint(
    State(state): State<SharedState>,
) -> Result<Json<Option<PositionDto>>, ApiError> {
    let checkpoint = state.oracle.get_checkpoint().map_err(oracle_error)?;
    Ok(Json(checkpoint.map(Into::into)))
}

/// `PUT /checkpoint`
///
/// Pins `hash` at `height`. Fails with 409 if a checkpoint is already set.
pub async fn put_checkpoint(
    State(state): State<SharedState>,
    Json(body): Json<PositionDto>,
) -> Result<(StatusCode, Json<PositionDto>), ApiError> {
    let checkpoint = Position::try_from(body)?;
    state
        .oracle
        .add_checkpoint(checkpoint.height, checkpoint.hash)
        .map_err(oracle_error)?;

    let best = state.oracle.best_chain().map_err(oracle_error)?;
    tracing::info!(%checkpoint, %best, "checkpoint set via API");
    Ok((StatusCode::OK, Json(best.into())))
}

/// `DELETE /checkpoint`
pub async fn delete_checkpoint(
    State(state): State<SharedState>,
) -> Result<Json<PositionDto>, ApiError> {
    state.oracle.delete_checkpoint().map_err(oracle_error)?;

    let best = state.oracle.best_chain().map_err(oracle_error)?;
    tracing::info!(%best, "checkpoint deleted via API");
    Ok(Json(best.into()))
}
