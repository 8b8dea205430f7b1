use std::sync::Arc;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tokenscan_common::store::{TokenStore, TransferStore};
use tokenscan_common::TokenscanError;

use crate::cache::RedisCache;
use crate::services::{cache_get, cache_put, TTL_HOLDER_COUNT, TTL_STATS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatsDto {
    pub token_address: String,
    pub total_transfers: i64,
    pub unique_senders: i64,
    pub unique_receivers: i64,
    pub total_volume: String,
    pub transfers_24h: i64,
    pub volume_24h: String,
    pub transfers_7d: i64,
    pub volume_7d: String,
    pub first_transfer_at: Option<String>,
    pub last_transfer_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatsResponse {
    pub data: TokenStatsDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderCountDto {
    pub token_address: String,
    pub holder_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderCountResponse {
    pub data: HolderCountDto,
}

#[derive(Clone)]
pub struct StatsService {
    transfers: Arc<dyn TransferStore>,
    tokens: Arc<dyn TokenStore>,
    cache: Option<RedisCache>,
}

impl StatsService {
    pub fn new(
        transfers: Arc<dyn TransferStore>,
        tokens: Arc<dyn TokenStore>,
        cache: Option<RedisCache>,
    ) -> Self {
        Self { transfers, tokens, cache }
    }

    /// `None` when the token is not registered.
    pub async fn token_stats(
        &self,
        token_address: &str,
    ) -> Result<Option<TokenStatsResponse>, TokenscanError> {
        let token_address = token_address.to_lowercase();
        let key = format!("stats:{token_address}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(Some(cached));
        }

        if self.tokens.get(&token_address).await?.is_none() {
            return Ok(None);
        }

        let stats = self.transfers.get_token_stats(&token_address).await?;
        let response = TokenStatsResponse {
            data: TokenStatsDto {
                token_address,
                total_transfers: stats.total_transfers,
                unique_senders: stats.unique_senders,
                unique_receivers: stats.unique_receivers,
                total_volume: stats.total_volume,
                transfers_24h: stats.transfers_24h,
                volume_24h: stats.volume_24h,
                transfers_7d: stats.transfers_7d,
                volume_7d: stats.volume_7d,
                first_transfer_at: stats
                    .first_transfer_at
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
                last_transfer_at: stats
                    .last_transfer_at
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            },
        };

        cache_put(&self.cache, &key, &response, TTL_STATS).await;
        Ok(Some(response))
    }

    /// `None` when the token is not registered.
    pub async fn holder_count(
        &self,
        token_address: &str,
    ) -> Result<Option<HolderCountResponse>, TokenscanError> {
        let token_address = token_address.to_lowercase();
        let key = format!("holder_count:{token_address}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(Some(cached));
        }

        if self.tokens.get(&token_address).await?.is_none() {
            return Ok(None);
        }

        let holder_count = self.transfers.get_holder_count(&token_address).await?;
        let response = HolderCountResponse {
            data: HolderCountDto { token_address, holder_count },
        };

        cache_put(&self.cache, &key, &response, TTL_HOLDER_COUNT).await;
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

    #[tokio::test]
    async fn missing_token_is_none_not_error() {
        let store = Arc::new(MemoryStore::new());
        let service = StatsService::new(store.clone(), store, None);

        assert!(service.token_stats(USDT).await.unwrap().is_none());
        assert!(service.holder_count(USDT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_reflect_inserted_transfers() {
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
                from_address: "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
                to_address: "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb".to_string(),
                value: BigDecimal::from_str("1000000").unwrap(),
            }])
            .await
            .unwrap();

        let service = StatsService::new(store.clone(), store, None);
        let stats = service.token_stats(USDT).await.unwrap().unwrap();
        assert_eq!(stats.data.total_transfers, 1);
        assert_eq!(stats.data.total_volume, "1000000");
        assert!(stats.data.first_transfer_at.is_some());

        let count = service.holder_count(USDT).await.unwrap().unwrap();
        assert_eq!(count.data.holder_count, 1);
    }
}
