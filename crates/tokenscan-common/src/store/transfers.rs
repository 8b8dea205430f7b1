use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::TokenscanError;
use crate::store::TransferStore;
use crate::types::{HolderBalance, TokenStats, Transfer, TransferFilter};

/// PostgreSQL-backed transfer store.
///
/// The unique index on `(tx_hash, log_index, block_timestamp)` is the sole
/// mechanism against double-indexing a log; callers may submit overlapping
/// ranges freely.
pub struct PgTransferStore {
    pool: PgPool,
}

impl PgTransferStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter_conditions<'a>(
        qb: &mut QueryBuilder<'a, Postgres>,
        filter: &'a TransferFilter,
    ) {
        qb.push(" WHERE TRUE");
        if let Some(token) = &filter.token_address {
            qb.push(" AND token_address = ").push_bind(token);
        }
        if let Some(from) = &filter.from_address {
            qb.push(" AND from_address = ").push_bind(from);
        }
        if let Some(to) = &filter.to_address {
            qb.push(" AND to_address = ").push_bind(to);
        }
        if let Some(addr) = &filter.address {
            qb.push(" AND (from_address = ")
                .push_bind(addr)
                .push(" OR to_address = ")
                .push_bind(addr)
                .push(")");
        }
        if let Some(from_block) = filter.from_block {
            qb.push(" AND block_number >= ").push_bind(from_block);
        }
        if let Some(to_block) = filter.to_block {
            qb.push(" AND block_number <= ").push_bind(to_block);
        }
        if let Some(from_time) = filter.from_time {
            qb.push(" AND block_timestamp >= ").push_bind(from_time);
        }
        if let Some(to_time) = filter.to_time {
            qb.push(" AND block_timestamp <= ").push_bind(to_time);
        }
    }
}

/// Positive-balance CTE shared by the holder queries. Balances are the
/// signed sum of transfer values per address, computed in NUMERIC space.
const BALANCES_CTE: &str = "\
    balances AS ( \
        SELECT address, SUM(amount) AS balance \
        FROM ( \
            SELECT to_address AS address, value AS amount \
            FROM transfers WHERE token_address = $1 \
            UNION ALL \
            SELECT from_address AS address, -value AS amount \
            FROM transfers WHERE token_address = $1 \
        ) movements \
        GROUP BY address \
        HAVING SUM(amount) > 0 \
    )";

#[async_trait]
impl TransferStore for PgTransferStore {
    async fn get_by_filter(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<Transfer>, TokenscanError> {
        let mut qb = QueryBuilder::new(
            "SELECT tx_hash, log_index, block_number, block_timestamp, \
             token_address, from_address, to_address, value \
             FROM transfers",
        );
        Self::push_filter_conditions(&mut qb, filter);
        qb.push(" ORDER BY block_timestamp DESC, log_index DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let transfers = qb
            .build_query_as::<Transfer>()
            .fetch_all(&self.pool)
            .await?;
        Ok(transfers)
    }

    async fn get_count(&self, filter: &TransferFilter) -> Result<i64, TokenscanError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM transfers");
        Self::push_filter_conditions(&mut qb, filter);

        let (count,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn batch_insert(&self, transfers: &[Transfer]) -> Result<u64, TokenscanError> {
        if transfers.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for t in transfers {
            let result = sqlx::query(
                "INSERT INTO transfers \
                 (tx_hash, log_index, block_number, block_timestamp, \
                  token_address, from_address, to_address, value) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (tx_hash, log_index, block_timestamp) DO NOTHING",
            )
            .bind(&t.tx_hash)
            .bind(t.log_index)
            .bind(t.block_number)
            .bind(t.block_timestamp)
            .bind(t.token_address.to_lowercase())
            .bind(t.from_address.to_lowercase())
            .bind(t.to_address.to_lowercase())
            .bind(&t.value)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn get_latest_block(&self, token_address: &str) -> Result<i64, TokenscanError> {
        let (block,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(block_number), 0) FROM transfers WHERE token_address = $1",
        )
        .bind(token_address)
        .fetch_one(&self.pool)
        .await?;
        Ok(block)
    }

    async fn get_token_stats(&self, token_address: &str) -> Result<TokenStats, TokenscanError> {
        type StatsRow = (
            i64,
            i64,
            i64,
            String,
            Option<DateTime<Utc>>,
            Option<DateTime<Utc>>,
            i64,
            String,
            i64,
            String,
        );

        let row: StatsRow = sqlx::query_as(
            "WITH all_time AS ( \
                SELECT COUNT(*) AS total_transfers, \
                       COUNT(DISTINCT from_address) AS unique_senders, \
                       COUNT(DISTINCT to_address) AS unique_receivers, \
                       COALESCE(SUM(value), 0)::TEXT AS total_volume, \
                       MIN(block_timestamp) AS first_transfer, \
                       MAX(block_timestamp) AS last_transfer \
                FROM transfers WHERE token_address = $1 \
            ), last_24h AS ( \
                SELECT COUNT(*) AS transfers, COALESCE(SUM(value), 0)::TEXT AS volume \
                FROM transfers \
                WHERE token_address = $1 AND block_timestamp >= NOW() - INTERVAL '24 hours' \
            ), last_7d AS ( \
                SELECT COUNT(*) AS transfers, COALESCE(SUM(value), 0)::TEXT AS volume \
                FROM transfers \
                WHERE token_address = $1 AND block_timestamp >= NOW() - INTERVAL '7 days' \
            ) \
            SELECT a.total_transfers, a.unique_senders, a.unique_receivers, a.total_volume, \
                   a.first_transfer, a.last_transfer, \
                   d.transfers, d.volume, w.transfers, w.volume \
            FROM all_time a, last_24h d, last_7d w",
        )
        .bind(token_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(TokenStats {
            total_transfers: row.0,
            unique_senders: row.1,
            unique_receivers: row.2,
            total_volume: row.3,
            first_transfer_at: row.4,
            last_transfer_at: row.5,
            transfers_24h: row.6,
            volume_24h: row.7,
            transfers_7d: row.8,
            volume_7d: row.9,
        })
    }

    async fn get_top_holders(
        &self,
        token_address: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HolderBalance>, TokenscanError> {
        let query = format!(
            "WITH {BALANCES_CTE} \
             SELECT address, balance::TEXT, \
                    ROW_NUMBER() OVER (ORDER BY balance DESC, address ASC) AS rank \
             FROM balances \
             ORDER BY balance DESC, address ASC \
             LIMIT $2 OFFSET $3"
        );

        let rows: Vec<(String, String, i64)> = sqlx::query_as(&query)
            .bind(token_address)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(address, balance, rank)| HolderBalance { address, balance, rank })
            .collect())
    }

    async fn get_holder_count(&self, token_address: &str) -> Result<i64, TokenscanError> {
        let query = format!("WITH {BALANCES_CTE} SELECT COUNT(*) FROM balances");

        let (count,): (i64,) = sqlx::query_as(&query)
            .bind(token_address)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_holder_balance(
        &self,
        token_address: &str,
        holder_address: &str,
    ) -> Result<HolderBalance, TokenscanError> {
        // Rank counts positive holders strictly ahead under the same
        // (balance DESC, address ASC) ordering the top-holders query uses.
        let query = format!(
            "WITH {BALANCES_CTE}, target AS ( \
                SELECT COALESCE(SUM( \
                    CASE WHEN to_address = $2 THEN value \
                         WHEN from_address = $2 THEN -value \
                         ELSE 0 END \
                ), 0) AS balance \
                FROM transfers \
                WHERE token_address = $1 AND (from_address = $2 OR to_address = $2) \
            ) \
            SELECT t.balance::TEXT, \
                   (SELECT COUNT(*) FROM balances b \
                    WHERE b.balance > t.balance \
                       OR (b.balance = t.balance AND b.address < $2)) + 1 AS rank \
            FROM target t"
        );

        let (balance, rank): (String, i64) = sqlx::query_as(&query)
            .bind(token_address)
            .bind(holder_address)
            .fetch_one(&self.pool)
            .await?;

        Ok(HolderBalance {
            address: holder_address.to_string(),
            balance,
            rank,
        })
    }
}
