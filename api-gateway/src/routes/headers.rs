use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use header_chain::{Hash256, Header, HeaderData, ImportOutcome, Status};

use super::{ApiError, PositionDto, bad_request, not_found, oracle_error, parse_hash};
use crate::state::SharedState;

/// Request body for `POST /headers`.
///
/// Hash fields are hex-encoded. The header must already have passed
/// proof-of-work and timestamp checks.
#[derive(Debug, Deserialize)]
pub struct SubmitHeaderRequest {
    pub version: u32,
    pub parent: String,
    pub merkle_root: String,
    pub timestamp: u64,
    pub difficulty: u64,
    pub nonce: u64,
}

impl TryFrom<SubmitHeaderRequest> for HeaderData {
    type Error = ApiError;

    fn try_from(req: SubmitHeaderRequest) -> Result<Self, Self::Error> {
        Ok(HeaderData {
            version: req.version,
            parent: parse_hash(&req.parent)?,
            merkle_root: Hash256::from_hex(&req.merkle_root)
                .ok_or_else(|| bad_request("expected 32-byte hex merkle root"))?,
            timestamp: req.timestamp,
            difficulty: req.difficulty,
            nonce: req.nonce,
        })
    }
}

/// Response body for `POST /headers`.
#[derive(Debug, Serialize)]
pub struct SubmitHeaderResponse {
    /// `"duplicate"`, `"disconnected"` or `"connected"`.
    pub outcome: &'static str,
    pub hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<PositionDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorg_parent: Option<PositionDto>,
}

/// `POST /headers`
pub async fn submit_header(
    State(state): State<SharedState>,
    Json(body): Json<SubmitHeaderRequest>,
) -> Result<(StatusCode, Json<SubmitHeaderResponse>), ApiError> {
    let header = Header::new(HeaderData::try_from(body)?);
    let hash = header.hash().to_hex();

    let outcome = state.oracle.add_header(header).map_err(oracle_error)?;

    let response = match outcome {
        ImportOutcome::Duplicate => (
            StatusCode::OK,
            SubmitHeaderResponse {
                outcome: "duplicate",
                hash,
                best: None,
                reorg_parent: None,
            },
        ),
        ImportOutcome::Disconnected => (
            StatusCode::ACCEPTED,
            SubmitHeaderResponse {
                outcome: "disconnected",
                hash,
                best: None,
                reorg_parent: None,
            },
        ),
        ImportOutcome::Connected { best, reorg_parent } => (
            StatusCode::CREATED,
            SubmitHeaderResponse {
                outcome: "connected",
                hash,
                best: Some(best.into()),
                reorg_parent: reorg_parent.map(Into::into),
            },
        ),
    };

    Ok((response.0, Json(response.1)))
}

/// Response body for `GET /headers/{hash}`.
#[derive(Debug, Serialize)]
pub struct HeaderResponse {
    pub hash: String,
    pub parent: String,
    pub version: u32,
    pub merkle_root: String,
    pub timestamp: u64,
    pub difficulty: u64,
    pub nonce: u64,
    /// Absent while the header is disconnected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    /// Cumulative work as a decimal string; `u128` does not fit JSON numbers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work: Option<String>,
    pub status: &'static str,
    pub in_best_chain: bool,
}

fn status_name(status: Status) -> &'static str {
    match status {
        Status::Normal => "normal",
        Status::Checkpoint => "checkpoint",
        Status::CheckpointBanned => "checkpoint_banned",
        Status::Disconnected => "disconnected",
    }
}

/// `GET /headers/{hash}`
pub async fn get_header(
    State(state): State<SharedState>,
    Path(hash): Path<String>,
) -> Result<Json<HeaderResponse>, ApiError> {
    let hash = parse_hash(&hash)?;
    let header = state
        .oracle
        .load_header(&hash)
        .map_err(oracle_error)?
        .ok_or_else(|| not_found("unknown header"))?;
    let in_best_chain = state.oracle.is_in_best_chain(&hash).map_err(oracle_error)?;

    let connected = !header.is_disconnected();
    let data = header.data();
    Ok(Json(HeaderResponse {
        hash: hash.to_hex(),
        parent: data.parent.to_hex(),
        version: data.version,
        merkle_root: hex::encode(data.merkle_root.as_bytes()),
        timestamp: data.timestamp,
        difficulty: data.difficulty,
        nonce: data.nonce,
        height: connected.then(|| header.height()),
        work: connected.then(|| header.work().to_string()),
        status: status_name(header.status()),
        in_best_chain,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(parent: &str) -> SubmitHeaderRequest {
        SubmitHeaderRequest {
            version: 1,
            parent: parent.to_string(),
            merkle_root: "00".repeat(32),
            timestamp: 1_700_000_000,
            difficulty: 3,
            nonce: 9,
        }
    }

    #[test]
    fn submit_request_converts_to_header_data() {
        let data = HeaderData::try_from(request(&"11".repeat(32))).unwrap();
        assert_eq!(data.parent.to_hex(), "11".repeat(32));
        assert_eq!(data.difficulty, 3);
    }

    #[test]
    fn disconnected_response_omits_chain_fields() {
        let response = SubmitHeaderResponse {
            outcome: "disconnected",
            hash: "ab".repeat(32),
            best: None,
            reorg_parent: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["outcome"], "disconnected");
        assert!(json.get("best").is_none());
        assert!(json.get("reorg_parent").is_none());
    }

    #[test]
    fn submit_request_parses_from_json() {
        let body = serde_json::json!({
            "version": 1,
            "parent": "22".repeat(32),
            "merkle_root": "00".repeat(32),
            "timestamp": 5,
            "difficulty": 2,
            "nonce": 0,
        });
        let req: SubmitHeaderRequest = serde_json::from_value(body).unwrap();
        assert_eq!(HeaderData::try_from(req).unwrap().timestamp, 5);
    }

    #[test]
    fn submit_request_rejects_short_parent() {
        let err = HeaderData::try_from(request("1111")).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
    }
}
