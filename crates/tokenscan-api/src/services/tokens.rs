use std::sync::Arc;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tokenscan_common::store::TokenStore;
use tokenscan_common::{Pagination, Token, TokenscanError};

use crate::cache::RedisCache;
use crate::services::{cache_get, cache_put, TTL_TOKENS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenDto {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: i16,
    pub total_indexed_transfers: i64,
    pub first_seen_block: Option<i64>,
    pub last_seen_block: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Token> for TokenDto {
    fn from(t: &Token) -> Self {
        Self {
            address: t.address.clone(),
            name: t.name.clone(),
            symbol: t.symbol.clone(),
            decimals: t.decimals,
            total_indexed_transfers: t.total_indexed_transfers,
            first_seen_block: t.first_seen_block,
            last_seen_block: t.last_seen_block,
            created_at: t.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            updated_at: t.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenListResponse {
    pub data: Vec<TokenDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub data: TokenDto,
}

#[derive(Clone)]
pub struct TokenService {
    tokens: Arc<dyn TokenStore>,
    cache: Option<RedisCache>,
}

impl TokenService {
    pub fn new(tokens: Arc<dyn TokenStore>, cache: Option<RedisCache>) -> Self {
        Self { tokens, cache }
    }

    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        sort_by: &str,
        sort_order: &str,
    ) -> Result<TokenListResponse, TokenscanError> {
        let key = format!("tokens:list:{limit}:{offset}:{sort_by}:{sort_order}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(cached);
        }

        let (tokens, total) = self
            .tokens
            .get_all_paginated(limit, offset, sort_by, sort_order)
            .await?;

        let response = TokenListResponse {
            data: tokens.iter().map(TokenDto::from).collect(),
            pagination: Pagination::new(total, limit, offset),
        };

        cache_put(&self.cache, &key, &response, TTL_TOKENS).await;
        Ok(response)
    }

    /// `None` when the token is not registered.
    pub async fn get(&self, address: &str) -> Result<Option<TokenResponse>, TokenscanError> {
        let address = address.to_lowercase();
        let key = format!("tokens:{address}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(Some(cached));
        }

        let Some(token) = self.tokens.get(&address).await? else {
            return Ok(None);
        };

        let response = TokenResponse { data: TokenDto::from(&token) };
        cache_put(&self.cache, &key, &response, TTL_TOKENS).await;
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tokenscan_common::store::MemoryStore;

    use super::*;

    fn token(address: &str, symbol: &str) -> Token {
        Token {
            address: address.to_string(),
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            decimals: 18,
            total_indexed_transfers: 0,
            first_seen_block: None,
            last_seen_block: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn get_is_case_insensitive_and_misses_cleanly() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(&token("0xdac17f958d2ee523a2206206994597c13d831ec7", "USDT"))
            .await
            .unwrap();

        let service = TokenService::new(store, None);
        let found = service
            .get("0xDAC17F958D2ee523a2206206994597C13D831ec7")
            .await
            .unwrap();
        assert_eq!(found.unwrap().data.symbol, "USDT");

        let missing = service
            .get("0x1111111111111111111111111111111111111111")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn list_pages_with_metadata() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert(&token("0x1111111111111111111111111111111111111111", "AAA"))
            .await
            .unwrap();
        store
            .upsert(&token("0x2222222222222222222222222222222222222222", "BBB"))
            .await
            .unwrap();

        let service = TokenService::new(store, None);
        let page = service.list(1, 0, "symbol", "asc").await.unwrap();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].symbol, "AAA");
        assert_eq!(page.pagination.total, 2);
        assert!(page.pagination.has_more);
    }
}
