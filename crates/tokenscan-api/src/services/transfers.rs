use std::sync::Arc;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokenscan_common::store::TransferStore;
use tokenscan_common::{Pagination, TokenscanError, Transfer, TransferFilter};

use crate::cache::RedisCache;
use crate::services::{cache_get, cache_put, TTL_TRANSFERS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDto {
    pub tx_hash: String,
    pub log_index: i32,
    pub block_number: i64,
    pub block_timestamp: String,
    pub token_address: String,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
}

impl From<&Transfer> for TransferDto {
    fn from(t: &Transfer) -> Self {
        Self {
            tx_hash: t.tx_hash.clone(),
            log_index: t.log_index,
            block_number: t.block_number,
            block_timestamp: t.block_timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            token_address: t.token_address.clone(),
            from_address: t.from_address.clone(),
            to_address: t.to_address.clone(),
            value: t.value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferListResponse {
    pub data: Vec<TransferDto>,
    pub pagination: Pagination,
}

#[derive(Clone)]
pub struct TransferService {
    transfers: Arc<dyn TransferStore>,
    cache: Option<RedisCache>,
}

impl TransferService {
    pub fn new(transfers: Arc<dyn TransferStore>, cache: Option<RedisCache>) -> Self {
        Self { transfers, cache }
    }

    pub async fn get_transfers(
        &self,
        filter: TransferFilter,
    ) -> Result<TransferListResponse, TokenscanError> {
        let filter = filter.normalized();
        let key = cache_key(&filter);

        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(cached);
        }

        let transfers = self.transfers.get_by_filter(&filter).await?;
        let total = self.transfers.get_count(&filter).await?;

        let response = TransferListResponse {
            data: transfers.iter().map(TransferDto::from).collect(),
            pagination: Pagination::new(total, filter.limit, filter.offset),
        };

        cache_put(&self.cache, &key, &response, TTL_TRANSFERS).await;
        Ok(response)
    }

    pub async fn get_transfers_by_address(
        &self,
        address: &str,
        limit: i64,
        offset: i64,
    ) -> Result<TransferListResponse, TokenscanError> {
        self.get_transfers(TransferFilter {
            address: Some(address.to_lowercase()),
            limit,
            offset,
            ..Default::default()
        })
        .await
    }

    pub async fn get_transfers_by_token(
        &self,
        token_address: &str,
        limit: i64,
        offset: i64,
    ) -> Result<TransferListResponse, TokenscanError> {
        self.get_transfers(TransferFilter {
            token_address: Some(token_address.to_lowercase()),
            limit,
            offset,
            ..Default::default()
        })
        .await
    }
}

/// Stable fingerprint of a normalized filter: every field participates,
/// addresses are already lowercase.
fn cache_key(filter: &TransferFilter) -> String {
    let fingerprint = format!(
        "token:{:?}|from:{:?}|to:{:?}|addr:{:?}|fb:{:?}|tb:{:?}|ft:{:?}|tt:{:?}|l:{}|o:{}",
        filter.token_address,
        filter.from_address,
        filter.to_address,
        filter.address,
        filter.from_block,
        filter.to_block,
        filter.from_time.map(|t| t.timestamp()),
        filter.to_time.map(|t| t.timestamp()),
        filter.limit,
        filter.offset,
    );
    let digest = Sha256::digest(fingerprint.as_bytes());
    format!("transfers:{}", hex::encode(&digest[..8]))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use tokenscan_common::store::MemoryStore;

    use super::*;

    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn transfer(tx_hash: &str, block: i64) -> Transfer {
        Transfer {
            tx_hash: tx_hash.to_string(),
            log_index: 0,
            block_number: block,
            block_timestamp: Utc::now(),
            token_address: USDT.to_string(),
            from_address: ALICE.to_string(),
            to_address: BOB.to_string(),
            value: BigDecimal::from_str("1000000").unwrap(),
        }
    }

    #[tokio::test]
    async fn pagination_metadata_is_consistent() {
        let store = Arc::new(MemoryStore::new());
        let rows: Vec<Transfer> = (0..150).map(|i| transfer(&format!("0x{i:03}"), i)).collect();
        store.batch_insert(&rows).await.unwrap();

        let service = TransferService::new(store, None);
        let page = service
            .get_transfers(TransferFilter { limit: 100, ..Default::default() })
            .await
            .unwrap();

        assert_eq!(page.data.len(), 100);
        assert_eq!(page.pagination.total, 150);
        assert!(page.pagination.has_more);

        let rest = service
            .get_transfers(TransferFilter { limit: 100, offset: 100, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rest.data.len(), 50);
        assert!(!rest.pagination.has_more);
    }

    #[tokio::test]
    async fn by_address_lowercases_input() {
        let store = Arc::new(MemoryStore::new());
        store.batch_insert(&[transfer("0x01", 1)]).await.unwrap();

        let service = TransferService::new(store, None);
        let page = service
            .get_transfers_by_address(&ALICE.to_uppercase().replace("0X", "0x"), 10, 0)
            .await
            .unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].from_address, ALICE);
    }

    #[test]
    fn cache_key_covers_every_field() {
        let base = TransferFilter::default().normalized();
        let mut with_token = base.clone();
        with_token.token_address = Some(USDT.to_string());
        let mut with_offset = base.clone();
        with_offset.offset = 100;

        let keys = [cache_key(&base), cache_key(&with_token), cache_key(&with_offset)];
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[0], keys[2]);
        assert_ne!(keys[1], keys[2]);
    }
}
