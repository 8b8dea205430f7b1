use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokenscan_common::store::{TokenStore, TransferStore};
use tokenscan_common::{clamp_page, HolderBalance, Pagination, TokenscanError};

use crate::cache::RedisCache;
use crate::services::{cache_get, cache_put, TTL_HOLDER, TTL_TOP_HOLDERS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderDto {
    pub address: String,
    pub balance: String,
    pub rank: i64,
}

impl From<HolderBalance> for HolderDto {
    fn from(h: HolderBalance) -> Self {
        Self { address: h.address, balance: h.balance, rank: h.rank }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopHoldersResponse {
    pub data: Vec<HolderDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderBalanceResponse {
    pub data: HolderDto,
}

#[derive(Clone)]
pub struct HoldersService {
    transfers: Arc<dyn TransferStore>,
    tokens: Arc<dyn TokenStore>,
    cache: Option<RedisCache>,
}

impl HoldersService {
    pub fn new(
        transfers: Arc<dyn TransferStore>,
        tokens: Arc<dyn TokenStore>,
        cache: Option<RedisCache>,
    ) -> Self {
        Self { transfers, tokens, cache }
    }

    /// `None` when the token is not registered.
    pub async fn top_holders(
        &self,
        token_address: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Option<TopHoldersResponse>, TokenscanError> {
        let token_address = token_address.to_lowercase();
        let (limit, offset) = clamp_page(limit, offset);

        let key = format!("holders:{token_address}:{limit}:{offset}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(Some(cached));
        }

        if self.tokens.get(&token_address).await?.is_none() {
            return Ok(None);
        }

        let total = self.transfers.get_holder_count(&token_address).await?;
        let holders = self
            .transfers
            .get_top_holders(&token_address, limit, offset)
            .await?;

        let response = TopHoldersResponse {
            data: holders.into_iter().map(HolderDto::from).collect(),
            pagination: Pagination::new(total, limit, offset),
        };

        cache_put(&self.cache, &key, &response, TTL_TOP_HOLDERS).await;
        Ok(Some(response))
    }

    /// `None` when the token is not registered. A holder with no activity
    /// gets a zero balance and ranks after every positive holder.
    pub async fn holder_balance(
        &self,
        token_address: &str,
        holder_address: &str,
    ) -> Result<Option<HolderBalanceResponse>, TokenscanError> {
        let token_address = token_address.to_lowercase();
        let holder_address = holder_address.to_lowercase();

        let key = format!("holder:{token_address}:{holder_address}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(Some(cached));
        }

        if self.tokens.get(&token_address).await?.is_none() {
            return Ok(None);
        }

        let holder = self
            .transfers
            .get_holder_balance(&token_address, &holder_address)
            .await?;

        let response = HolderBalanceResponse { data: HolderDto::from(holder) };
        cache_put(&self.cache, &key, &response, TTL_HOLDER).await;
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use tokenscan_common::store::MemoryStore;
    use tokenscan_common::{Token, Transfer};

    use super::*;

    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(&Token {
                address: USDT.to_string(),
                name: "Tether USD".to_string(),
                symbol: "USDT".to_string(),
                decimals: 6,
                total_indexed_transfers: 0,
                first_seen_block: None,
                last_seen_block: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .batch_insert(&[Transfer {
                tx_hash: "0x01".to_string(),
                log_index: 0,
                block_number: 10,
                block_timestamp: Utc::now(),
                token_address: USDT.to_string(),
                from_address: ALICE.to_string(),
                to_address: BOB.to_string(),
                value: BigDecimal::from_str("100").unwrap(),
            }])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn unknown_token_returns_none() {
        let store = Arc::new(MemoryStore::new());
        let service = HoldersService::new(store.clone(), store, None);
        assert!(service.top_holders(USDT, 10, 0).await.unwrap().is_none());
        assert!(service.holder_balance(USDT, ALICE).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn top_holders_with_clamped_page() {
        let store = seeded_store().await;
        let service = HoldersService::new(store.clone(), store, None);

        // Out-of-range limit/offset are clamped, not rejected.
        let top = service.top_holders(USDT, -5, -10).await.unwrap().unwrap();
        assert_eq!(top.pagination.limit, 100);
        assert_eq!(top.pagination.offset, 0);
        assert_eq!(top.data.len(), 1);
        assert_eq!(top.data[0].address, BOB);
        assert_eq!(top.data[0].rank, 1);
    }

    #[tokio::test]
    async fn holder_balance_lowercases_and_signs() {
        let store = seeded_store().await;
        let service = HoldersService::new(store.clone(), store, None);

        let sender = service
            .holder_balance(USDT, &ALICE.to_uppercase().replace("0X", "0x"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sender.data.address, ALICE);
        assert_eq!(sender.data.balance, "-100");
        assert_eq!(sender.data.rank, 2);
    }
}
