use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokenscan_common::format::format_balance;
use tokenscan_common::store::PortfolioStore;
use tokenscan_common::{TokenHolding, TokenscanError};

use crate::cache::RedisCache;
use crate::services::{cache_get, cache_put, TTL_PORTFOLIO, TTL_WALLET_SUMMARY};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHoldingDto {
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub decimals: i16,
    /// Raw balance in the token's smallest unit.
    pub balance: String,
    /// Balance adjusted for decimals.
    pub balance_formatted: String,
}

impl From<&TokenHolding> for TokenHoldingDto {
    fn from(h: &TokenHolding) -> Self {
        Self {
            token_address: h.token_address.clone(),
            token_name: h.token_name.clone(),
            token_symbol: h.token_symbol.clone(),
            decimals: h.decimals,
            balance: h.balance.clone(),
            balance_formatted: format_balance(&h.balance, h.decimals.max(0) as u32),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSummaryDto {
    pub total_tokens: i64,
    pub total_transfers_in: i64,
    pub total_transfers_out: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioDto {
    pub wallet_address: String,
    pub holdings: Vec<TokenHoldingDto>,
    pub summary: PortfolioSummaryDto,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioResponse {
    pub data: PortfolioDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHoldingResponse {
    pub data: TokenHoldingDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummaryDto {
    pub wallet_address: String,
    pub total_transfers_in: i64,
    pub total_transfers_out: i64,
    pub total_volume_in: String,
    pub total_volume_out: String,
    pub unique_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_transfer_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transfer_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummaryResponse {
    pub data: WalletSummaryDto,
}

#[derive(Clone)]
pub struct PortfolioService {
    portfolio: Arc<dyn PortfolioStore>,
    cache: Option<RedisCache>,
}

impl PortfolioService {
    pub fn new(portfolio: Arc<dyn PortfolioStore>, cache: Option<RedisCache>) -> Self {
        Self { portfolio, cache }
    }

    pub async fn get_portfolio(
        &self,
        wallet_address: &str,
    ) -> Result<PortfolioResponse, TokenscanError> {
        let wallet_address = wallet_address.to_lowercase();
        let key = format!("portfolio:{wallet_address}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(cached);
        }

        let holdings = self.portfolio.wallet_holdings(&wallet_address).await?;
        let summary = self.portfolio.wallet_summary(&wallet_address).await?;

        let response = PortfolioResponse {
            data: PortfolioDto {
                wallet_address,
                holdings: holdings.iter().map(TokenHoldingDto::from).collect(),
                summary: PortfolioSummaryDto {
                    total_tokens: holdings.len() as i64,
                    total_transfers_in: summary.transfers_in,
                    total_transfers_out: summary.transfers_out,
                },
                updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        };

        cache_put(&self.cache, &key, &response, TTL_PORTFOLIO).await;
        Ok(response)
    }

    /// `None` when the token is not registered.
    pub async fn get_portfolio_by_token(
        &self,
        wallet_address: &str,
        token_address: &str,
    ) -> Result<Option<TokenHoldingResponse>, TokenscanError> {
        let wallet_address = wallet_address.to_lowercase();
        let token_address = token_address.to_lowercase();

        let key = format!("portfolio:{wallet_address}:{token_address}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(Some(cached));
        }

        let Some(holding) = self
            .portfolio
            .wallet_holding_by_token(&wallet_address, &token_address)
            .await?
        else {
            return Ok(None);
        };

        let response = TokenHoldingResponse { data: TokenHoldingDto::from(&holding) };
        cache_put(&self.cache, &key, &response, TTL_PORTFOLIO).await;
        Ok(Some(response))
    }

    pub async fn get_wallet_summary(
        &self,
        wallet_address: &str,
    ) -> Result<WalletSummaryResponse, TokenscanError> {
        let wallet_address = wallet_address.to_lowercase();
        let key = format!("wallet_summary:{wallet_address}");
        if let Some(cached) = cache_get(&self.cache, &key).await {
            return Ok(cached);
        }

        let summary = self.portfolio.wallet_summary(&wallet_address).await?;
        let response = WalletSummaryResponse {
            data: WalletSummaryDto {
                wallet_address,
                total_transfers_in: summary.transfers_in,
                total_transfers_out: summary.transfers_out,
                total_volume_in: summary.volume_in,
                total_volume_out: summary.volume_out,
                unique_tokens: summary.unique_tokens,
                first_transfer_at: summary
                    .first_transfer_at
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
                last_transfer_at: summary
                    .last_transfer_at
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            },
        };

        cache_put(&self.cache, &key, &response, TTL_WALLET_SUMMARY).await;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use tokenscan_common::store::{MemoryStore, TokenStore, TransferStore};
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
                value: BigDecimal::from_str("1200000").unwrap(),
            }])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn portfolio_formats_balances_with_decimals() {
        let store = seeded_store().await;
        let service = PortfolioService::new(store, None);

        let portfolio = service.get_portfolio(BOB).await.unwrap();
        assert_eq!(portfolio.data.holdings.len(), 1);
        assert_eq!(portfolio.data.holdings[0].balance, "1200000");
        assert_eq!(portfolio.data.holdings[0].balance_formatted, "1.2");
        assert_eq!(portfolio.data.summary.total_tokens, 1);
        assert_eq!(portfolio.data.summary.total_transfers_in, 1);
    }

    #[tokio::test]
    async fn empty_portfolio_is_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        let service = PortfolioService::new(store, None);

        let portfolio = service.get_portfolio(ALICE).await.unwrap();
        assert!(portfolio.data.holdings.is_empty());
        assert_eq!(portfolio.data.summary.total_tokens, 0);
    }

    #[tokio::test]
    async fn holding_by_token_distinguishes_missing_token() {
        let store = seeded_store().await;
        let service = PortfolioService::new(store, None);

        let holding = service.get_portfolio_by_token(BOB, USDT).await.unwrap().unwrap();
        assert_eq!(holding.data.balance, "1200000");

        let missing = service
            .get_portfolio_by_token(BOB, "0x1111111111111111111111111111111111111111")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn wallet_summary_aggregates_both_directions() {
        let store = seeded_store().await;
        let service = PortfolioService::new(store, None);

        let summary = service.get_wallet_summary(ALICE).await.unwrap();
        assert_eq!(summary.data.total_transfers_out, 1);
        assert_eq!(summary.data.total_volume_out, "1200000");
        assert_eq!(summary.data.total_transfers_in, 0);
        assert_eq!(summary.data.unique_tokens, 1);
        assert!(summary.data.first_transfer_at.is_some());
    }
}
