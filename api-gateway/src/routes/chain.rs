//! Best-chain queries.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use header_chain::Position;

use super::{ApiError, PositionDto, not_found, oracle_error, parse_hash};
use crate::state::SharedState;

/// `GET /chain/best`
pub async fn best(State(state): State<SharedState>) -> Result<Json<PositionDto>, ApiError> {
    let best = state.oracle.best_chain().map_err(oracle_error)?;
    Ok(Json(best.into()))
}

/// `GET /chain/hash/{height}`
pub async fn hash_at(
    State(state): State<SharedState>,
    Path(height): Path<u64>,
) -> Result<Json<PositionDto>, ApiError> {
    let hash = state
        .oracle
        .best_hash(height)
        .map_err(oracle_error)?
        .ok_or_else(|| not_found("height is above the best tip"))?;
    Ok(Json(Position::new(height, hash).into()))
}

#[derive(Debug, Deserialize)]
pub struct HashesQuery {
    #[serde(default)]
    pub start: u64,
    /// Zero or absent means no limit.
    #[serde(default)]
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct HashesResponse {
    pub start: u64,
    pub hashes: Vec<String>,
}

/// `GET /chain/hashes?start=&limit=`
pub async fn hashes(
    State(state): State<SharedState>,
    Query(query): Query<HashesQuery>,
) -> Result<Json<HashesResponse>, ApiError> {
    let hashes = state
        .oracle
        .best_hashes(query.start, query.limit)
        .map_err(oracle_error)?
        .iter()
        .map(|h| h.to_hex())
        .collect();
    Ok(Json(HashesResponse {
        start: query.start,
        hashes,
    }))
}

/// `GET /chain/siblings`
///
/// Tips of every known side chain, hex-sorted for stable output.
pub async fn siblings(State(state): State<SharedState>) -> Result<Json<Vec<String>>, ApiError> {
    let mut out: Vec<String> = state
        .oracle
        .siblings()
        .map_err(oracle_error)?
        .iter()
        .map(|h| h.to_hex())
        .collect();
    out.sort();
    Ok(Json(out))
}

#[derive(Debug, Serialize)]
pub struct CommonParentResponse {
    pub common: PositionDto,
    pub best: PositionDto,
}

/// `GET /chain/common-parent/{height}/{hash}`
pub async fn common_parent(
    State(state): State<SharedState>,
    Path((height, hash)): Path<(u64, String)>,
) -> Result<Json<CommonParentResponse>, ApiError> {
    let position = Position::new(height, parse_hash(&hash)?);
    let (common, best) = state
        .oracle
        .common_parent(&position)
        .map_err(oracle_error)?;
    Ok(Json(CommonParentResponse {
        common: common.into(),
        best: best.into(),
    }))
}
