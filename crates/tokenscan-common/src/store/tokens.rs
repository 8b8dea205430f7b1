use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::TokenscanError;
use crate::store::TokenStore;
use crate::types::Token;

/// Columns the token listing may sort by. The whitelist is a security
/// invariant: `sort_by` is interpolated into SQL and must never carry
/// caller-controlled text.
pub const TOKEN_SORT_COLUMNS: &[&str] = &[
    "address",
    "name",
    "symbol",
    "decimals",
    "total_indexed_transfers",
    "first_seen_block",
    "last_seen_block",
    "created_at",
    "updated_at",
];

pub const DEFAULT_TOKEN_SORT: &str = "total_indexed_transfers";

/// Resolve caller-supplied sort parameters against the whitelist.
pub fn sanitize_token_sort<'a>(sort_by: &'a str, sort_order: &str) -> (&'a str, &'static str) {
    let column = if TOKEN_SORT_COLUMNS.contains(&sort_by) {
        sort_by
    } else {
        DEFAULT_TOKEN_SORT
    };
    let order = match sort_order {
        "asc" => "ASC",
        _ => "DESC",
    };
    (column, order)
}

/// PostgreSQL-backed token registry.
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TOKEN_COLUMNS: &str = "address, name, symbol, decimals, total_indexed_transfers, \
                             first_seen_block, last_seen_block, created_at, updated_at";

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn get(&self, address: &str) -> Result<Option<Token>, TokenscanError> {
        let token = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE address = $1"
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn upsert(&self, token: &Token) -> Result<(), TokenscanError> {
        sqlx::query(
            "INSERT INTO tokens (address, name, symbol, decimals, first_seen_block) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (address) DO UPDATE SET \
                name = EXCLUDED.name, \
                symbol = EXCLUDED.symbol, \
                decimals = EXCLUDED.decimals, \
                updated_at = NOW()",
        )
        .bind(token.address.to_lowercase())
        .bind(&token.name)
        .bind(&token.symbol)
        .bind(token.decimals)
        .bind(token.first_seen_block)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_all_paginated(
        &self,
        limit: i64,
        offset: i64,
        sort_by: &str,
        sort_order: &str,
    ) -> Result<(Vec<Token>, i64), TokenscanError> {
        let (column, order) = sanitize_token_sort(sort_by, sort_order);

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tokens")
            .fetch_one(&self.pool)
            .await?;

        let tokens = sqlx::query_as::<_, Token>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens \
             ORDER BY {column} {order} \
             LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((tokens, total))
    }

    async fn count(&self) -> Result<i64, TokenscanError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_stats(
        &self,
        address: &str,
        transfer_delta: i64,
        last_block: i64,
    ) -> Result<(), TokenscanError> {
        sqlx::query(
            "UPDATE tokens SET \
                total_indexed_transfers = total_indexed_transfers + $2, \
                last_seen_block = GREATEST(COALESCE(last_seen_block, 0), $3), \
                updated_at = NOW() \
             WHERE address = $1",
        )
        .bind(address)
        .bind(transfer_delta)
        .bind(last_block)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_whitelist_accepts_known_columns() {
        assert_eq!(sanitize_token_sort("symbol", "asc"), ("symbol", "ASC"));
        assert_eq!(sanitize_token_sort("last_seen_block", "desc"), ("last_seen_block", "DESC"));
    }

    #[test]
    fn sort_whitelist_rejects_unknown_input() {
        assert_eq!(
            sanitize_token_sort("address; DROP TABLE tokens", "asc"),
            (DEFAULT_TOKEN_SORT, "ASC")
        );
        assert_eq!(sanitize_token_sort("balance", "DESC; --"), (DEFAULT_TOKEN_SORT, "DESC"));
    }
}
