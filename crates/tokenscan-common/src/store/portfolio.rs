use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::TokenscanError;
use crate::store::PortfolioStore;
use crate::types::{TokenHolding, WalletSummary};

/// PostgreSQL-backed portfolio reads. Balances are always the signed sum
/// of transfer values, computed per token in NUMERIC space.
pub struct PgPortfolioStore {
    pool: PgPool,
}

impl PgPortfolioStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PortfolioStore for PgPortfolioStore {
    async fn wallet_holdings(
        &self,
        wallet_address: &str,
    ) -> Result<Vec<TokenHolding>, TokenscanError> {
        let holdings = sqlx::query_as::<_, TokenHolding>(
            "WITH balances AS ( \
                SELECT token_address, \
                       SUM(CASE WHEN to_address = $1 THEN value ELSE 0 END) - \
                       SUM(CASE WHEN from_address = $1 THEN value ELSE 0 END) AS balance \
                FROM transfers \
                WHERE from_address = $1 OR to_address = $1 \
                GROUP BY token_address \
                HAVING SUM(CASE WHEN to_address = $1 THEN value ELSE 0 END) - \
                       SUM(CASE WHEN from_address = $1 THEN value ELSE 0 END) > 0 \
            ) \
            SELECT b.token_address, \
                   t.name AS token_name, \
                   t.symbol AS token_symbol, \
                   t.decimals, \
                   b.balance::TEXT AS balance \
            FROM balances b \
            JOIN tokens t ON t.address = b.token_address \
            ORDER BY b.balance DESC",
        )
        .bind(wallet_address)
        .fetch_all(&self.pool)
        .await?;
        Ok(holdings)
    }

    async fn wallet_holding_by_token(
        &self,
        wallet_address: &str,
        token_address: &str,
    ) -> Result<Option<TokenHolding>, TokenscanError> {
        let holding = sqlx::query_as::<_, TokenHolding>(
            "SELECT t.address AS token_address, \
                    t.name AS token_name, \
                    t.symbol AS token_symbol, \
                    t.decimals, \
                    COALESCE(SUM( \
                        CASE WHEN tr.to_address = $1 THEN tr.value \
                             WHEN tr.from_address = $1 THEN -tr.value \
                             ELSE 0 END \
                    ), 0)::TEXT AS balance \
             FROM tokens t \
             LEFT JOIN transfers tr ON tr.token_address = t.address \
                AND (tr.from_address = $1 OR tr.to_address = $1) \
             WHERE t.address = $2 \
             GROUP BY t.address, t.name, t.symbol, t.decimals",
        )
        .bind(wallet_address)
        .bind(token_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(holding)
    }

    async fn wallet_summary(
        &self,
        wallet_address: &str,
    ) -> Result<WalletSummary, TokenscanError> {
        type SummaryRow = (
            i64,
            i64,
            String,
            String,
            i64,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
        );

        let row: SummaryRow = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE to_address = $1) AS transfers_in, \
                    COUNT(*) FILTER (WHERE from_address = $1) AS transfers_out, \
                    COALESCE(SUM(value) FILTER (WHERE to_address = $1), 0)::TEXT AS volume_in, \
                    COALESCE(SUM(value) FILTER (WHERE from_address = $1), 0)::TEXT AS volume_out, \
                    COUNT(DISTINCT token_address) AS unique_tokens, \
                    MIN(block_timestamp) AS first_transfer, \
                    MAX(block_timestamp) AS last_transfer \
             FROM transfers \
             WHERE from_address = $1 OR to_address = $1",
        )
        .bind(wallet_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(WalletSummary {
            transfers_in: row.0,
            transfers_out: row.1,
            volume_in: row.2,
            volume_out: row.3,
            unique_tokens: row.4,
            first_transfer_at: row.5,
            last_transfer_at: row.6,
        })
    }
}
