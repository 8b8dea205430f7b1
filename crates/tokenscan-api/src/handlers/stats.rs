use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tokenscan_common::TokenscanError;

use crate::error::{ApiError, ApiResult};
use crate::handlers::require_address;
use crate::services::stats::{HolderCountResponse, TokenStatsResponse};
use crate::AppState;

/// GET /api/v1/tokens/{address}/stats
pub async fn get_token_stats(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<TokenStatsResponse>> {
    let address = require_address(&address, "token address")?;

    let stats = state
        .stats
        .token_stats(&address)
        .await?
        .ok_or_else(|| ApiError(TokenscanError::NotFound(format!("Token {address} not found"))))?;

    Ok(Json(stats))
}

/// GET /api/v1/tokens/{address}/holders/count
pub async fn get_holder_count(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<HolderCountResponse>> {
    let address = require_address(&address, "token address")?;

    let count = state
        .stats
        .holder_count(&address)
        .await?
        .ok_or_else(|| ApiError(TokenscanError::NotFound(format!("Token {address} not found"))))?;

    Ok(Json(count))
}
