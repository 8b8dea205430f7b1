use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tokenscan_common::{clamp_page, TokenscanError};

use crate::error::{ApiError, ApiResult};
use crate::handlers::require_address;
use crate::services::tokens::{TokenListResponse, TokenResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// GET /api/v1/tokens
pub async fn list_tokens(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenListQuery>,
) -> ApiResult<Json<TokenListResponse>> {
    let (limit, offset) = clamp_page(query.limit.unwrap_or(100), query.offset.unwrap_or(0));
    let sort_by = query.sort_by.as_deref().unwrap_or("total_indexed_transfers");
    let sort_order = query.sort_order.as_deref().unwrap_or("desc");

    Ok(Json(state.tokens.list(limit, offset, sort_by, sort_order).await?))
}

/// GET /api/v1/tokens/{address}
pub async fn get_token(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> ApiResult<Json<TokenResponse>> {
    let address = require_address(&address, "token address")?;

    let token = state
        .tokens
        .get(&address)
        .await?
        .ok_or_else(|| ApiError(TokenscanError::NotFound(format!("Token {address} not found"))))?;

    Ok(Json(token))
}
