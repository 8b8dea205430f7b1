use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokenscan_common::TransferFilter;

use crate::error::ApiResult;
use crate::handlers::{require_address, PageQuery};
use crate::services::transfers::TransferListResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub token: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub address: Option<String>,
    pub from_block: Option<i64>,
    pub to_block: Option<i64>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/v1/transfers
pub async fn list_transfers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransferQuery>,
) -> ApiResult<Json<TransferListResponse>> {
    let mut filter = TransferFilter::default();

    if let Some(token) = &query.token {
        filter.token_address = Some(require_address(token, "token address")?);
    }
    if let Some(from) = &query.from {
        filter.from_address = Some(require_address(from, "from address")?);
    }
    if let Some(to) = &query.to {
        filter.to_address = Some(require_address(to, "to address")?);
    }
    if let Some(address) = &query.address {
        filter.address = Some(require_address(address, "address")?);
    }
    filter.from_block = query.from_block;
    filter.to_block = query.to_block;
    filter.from_time = query.from_time;
    filter.to_time = query.to_time;
    if let Some(limit) = query.limit {
        filter.limit = limit;
    }
    if let Some(offset) = query.offset {
        filter.offset = offset;
    }

    Ok(Json(state.transfers.get_transfers(filter).await?))
}

/// GET /api/v1/transfers/address/{address}
pub async fn get_transfers_by_address(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<TransferListResponse>> {
    let address = require_address(&address, "address")?;
    Ok(Json(
        state
            .transfers
            .get_transfers_by_address(&address, page.limit(), page.offset())
            .await?,
    ))
}

/// GET /api/v1/tokens/{address}/transfers
pub async fn get_token_transfers(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<TransferListResponse>> {
    let address = require_address(&address, "token address")?;
    Ok(Json(
        state
            .transfers
            .get_transfers_by_token(&address, page.limit(), page.offset())
            .await?,
    ))
}
