//! HTTP route handlers and the JSON shapes they share.

pub mod chain;
pub mod checkpoint;
pub mod headers;
pub mod health;
pub mod metrics;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use header_chain::{BlockHash, OracleError, Position};

/// Error half of every handler result.
pub type ApiError = (StatusCode, String);

/// JSON form of a [`Position`], with the hash hex-encoded.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PositionDto {
    pub height: u64,
    pub hash: String,
}

impl From<Position> for PositionDto {
    fn from(pos: Position) -> Self {
        Self {
            height: pos.height,
            hash: pos.hash.to_hex(),
        }
    }
}

impl TryFrom<PositionDto> for Position {
    type Error = ApiError;

    fn try_from(dto: PositionDto) -> Result<Self, Self::Error> {
        Ok(Position::new(dto.height, parse_hash(&dto.hash)?))
    }
}

/// Parses a 32-byte hex string into a `BlockHash`.
pub fn parse_hash(hex_str: &str) -> Result<BlockHash, ApiError> {
    BlockHash::from_hex(hex_str).ok_or_else(|| bad_request("expected 32-byte hex hash"))
}

pub fn bad_request(msg: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.to_string())
}

pub fn not_found(msg: &str) -> ApiError {
    (StatusCode::NOT_FOUND, msg.to_string())
}

/// Maps an oracle failure to an HTTP status.
///
/// Checkpoint-state conflicts are 409, input the oracle refuses is 422 and
/// anything storage-related is 500.
pub fn oracle_error(e: OracleError) -> ApiError {
    let status = match &e {
        OracleError::CheckpointExists(_)
        | OracleError::NoCheckpoint
        | OracleError::NoEligibleTip => StatusCode::CONFLICT,
        OracleError::GenesisReorg | OracleError::InvalidCheckpoint(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OracleError::Corrupted(_) | OracleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use header_chain::{HASH_LEN, Hash256};

    #[test]
    fn position_dto_hex_round_trip() {
        let pos = Position::new(5, BlockHash(Hash256([0xab; HASH_LEN])));
        let dto = PositionDto::from(pos);
        assert_eq!(dto.hash, "ab".repeat(HASH_LEN));
        assert_eq!(Position::try_from(dto).unwrap(), pos);
    }

    #[test]
    fn malformed_hashes_are_bad_requests() {
        assert_eq!(parse_hash("zz").unwrap_err().0, StatusCode::BAD_REQUEST);
        assert_eq!(parse_hash("abcd").unwrap_err().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn oracle_errors_map_to_statuses() {
        assert_eq!(oracle_error(OracleError::NoCheckpoint).0, StatusCode::CONFLICT);
        assert_eq!(
            oracle_error(OracleError::InvalidCheckpoint("height")).0,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            oracle_error(OracleError::Corrupted("x".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
