use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::TokenscanError;
use crate::store::StateStore;
use crate::types::IndexerState;

/// PostgreSQL-backed watermark store.
pub struct PgStateStore {
    pool: PgPool,
}

impl PgStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StateStore for PgStateStore {
    async fn get(&self, token_address: &str) -> Result<Option<IndexerState>, TokenscanError> {
        let state = sqlx::query_as::<_, IndexerState>(
            "SELECT token_address, last_indexed_block, is_backfilling, \
                    backfill_from_block, backfill_to_block, updated_at \
             FROM indexer_state WHERE token_address = $1",
        )
        .bind(token_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(state)
    }

    async fn upsert(&self, state: &IndexerState) -> Result<(), TokenscanError> {
        sqlx::query(
            "INSERT INTO indexer_state \
             (token_address, last_indexed_block, is_backfilling, backfill_from_block, backfill_to_block) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (token_address) DO UPDATE SET \
                last_indexed_block = EXCLUDED.last_indexed_block, \
                is_backfilling = EXCLUDED.is_backfilling, \
                backfill_from_block = EXCLUDED.backfill_from_block, \
                backfill_to_block = EXCLUDED.backfill_to_block, \
                updated_at = NOW()",
        )
        .bind(state.token_address.to_lowercase())
        .bind(state.last_indexed_block)
        .bind(state.is_backfilling)
        .bind(state.backfill_from_block)
        .bind(state.backfill_to_block)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_last_block(
        &self,
        token_address: &str,
        block_number: i64,
    ) -> Result<(), TokenscanError> {
        // Upsert so a missing row is initialized rather than silently
        // dropped.
        sqlx::query(
            "INSERT INTO indexer_state (token_address, last_indexed_block) \
             VALUES ($1, $2) \
             ON CONFLICT (token_address) DO UPDATE SET \
                last_indexed_block = EXCLUDED.last_indexed_block, \
                updated_at = NOW()",
        )
        .bind(token_address)
        .bind(block_number)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_backfilling(
        &self,
        token_address: &str,
        is_backfilling: bool,
        from_block: Option<i64>,
        to_block: Option<i64>,
    ) -> Result<(), TokenscanError> {
        sqlx::query(
            "UPDATE indexer_state SET \
                is_backfilling = $2, \
                backfill_from_block = $3, \
                backfill_to_block = $4, \
                updated_at = NOW() \
             WHERE token_address = $1",
        )
        .bind(token_address)
        .bind(is_backfilling)
        .bind(from_block)
        .bind(to_block)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
