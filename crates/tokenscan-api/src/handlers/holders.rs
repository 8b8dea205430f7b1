use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;
use tokenscan_common::TokenscanError;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{require_address, PageQuery};
use crate::services::holders::{HolderBalanceResponse, TopHoldersResponse};
use crate::AppState;

/// GET /api/v1/tokens/{address}/holders/top
pub async fn get_top_holders(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<TopHoldersResponse>> {
    let address = require_address(&address, "token address")?;

    let holders = state
        .holders
        .top_holders(&address, page.limit(), page.offset())
        .await?
        .ok_or_else(|| ApiError(TokenscanError::NotFound(format!("Token {address} not found"))))?;

    Ok(Json(holders))
}

/// GET /api/v1/tokens/{address}/holders/{holder}
pub async fn get_holder_balance(
    State(state): State<Arc<AppState>>,
    Path((address, holder)): Path<(String, String)>,
) -> ApiResult<Json<HolderBalanceResponse>> {
    let address = require_address(&address, "token address")?;
    let holder = require_address(&holder, "holder address")?;

    let balance = state
        .holders
        .holder_balance(&address, &holder)
        .await?
        .ok_or_else(|| ApiError(TokenscanError::NotFound(format!("Token {address} not found"))))?;

    Ok(Json(balance))
}
