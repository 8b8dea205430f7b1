use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use tokenscan_common::TokenscanError;

use crate::error::{ApiError, ApiResult};
use crate::handlers::require_address;
use crate::services::portfolio::{PortfolioResponse, TokenHoldingResponse, WalletSummaryResponse};
use crate::AppState;

/// GET /api/v1/portfolio/{wallet}
pub async fn get_portfolio(
    State(state): State<Arc<AppState>>,
    Path(wallet): Path<String>,
) -> ApiResult<Json<PortfolioResponse>> {
    let wallet = require_address(&wallet, "wallet address")?;
    Ok(Json(state.portfolio.get_portfolio(&wallet).await?))
}

/// GET /api/v1/portfolio/{wallet}/tokens/{token}
pub async fn get_portfolio_by_token(
    State(state): State<Arc<AppState>>,
    Path((wallet, token)): Path<(String, String)>,
) -> ApiResult<Json<TokenHoldingResponse>> {
    let wallet = require_address(&wallet, "wallet address")?;
    let token = require_address(&token, "token address")?;

    let holding = state
        .portfolio
        .get_portfolio_by_token(&wallet, &token)
        .await?
        .ok_or_else(|| ApiError(TokenscanError::NotFound(format!("Token {token} not found"))))?;

    Ok(Json(holding))
}

/// GET /api/v1/portfolio/{wallet}/summary
pub async fn get_wallet_summary(
    State(state): State<Arc<AppState>>,
    Path(wallet): Path<String>,
) -> ApiResult<Json<WalletSummaryResponse>> {
    let wallet = require_address(&wallet, "wallet address")?;
    Ok(Json(state.portfolio.get_wallet_summary(&wallet).await?))
}
