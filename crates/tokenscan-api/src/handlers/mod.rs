pub mod holders;
pub mod portfolio;
pub mod stats;
pub mod status;
pub mod tokens;
pub mod transfers;

use serde::Deserialize;
use tokenscan_common::{is_valid_address, TokenscanError, DEFAULT_PAGE_LIMIT};

use crate::error::ApiError;

/// Validate a hex address parameter and lowercase it. Malformed input is a
/// 400, reported distinctly from a missing resource.
pub fn require_address(value: &str, what: &str) -> Result<String, ApiError> {
    if !is_valid_address(value) {
        return Err(ApiError(TokenscanError::InvalidInput(format!(
            "invalid {what}: must be a 0x-prefixed 40-hex-digit address"
        ))));
    }
    Ok(value.to_lowercase())
}

/// Common `limit`/`offset` query parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0)
    }
}
