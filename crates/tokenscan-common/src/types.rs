use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// ERC-20 Transfer event as stored in the database.
///
/// `(tx_hash, log_index, block_timestamp)` uniquely keys a log; the
/// timestamp is part of the key so the time-partitioned table can enforce
/// uniqueness per partition.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub tx_hash: String,
    pub log_index: i32,
    pub block_number: i64,
    pub block_timestamp: DateTime<Utc>,
    pub token_address: String,
    pub from_address: String,
    pub to_address: String,
    pub value: BigDecimal,
}

/// Filter for transfer queries. All address fields must be lowercase
/// before they reach a store.
#[derive(Debug, Clone)]
pub struct TransferFilter {
    pub token_address: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    /// Matches transfers where the address is either endpoint.
    pub address: Option<String>,
    pub from_block: Option<i64>,
    pub to_block: Option<i64>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TransferFilter {
    fn default() -> Self {
        Self {
            token_address: None,
            from_address: None,
            to_address: None,
            address: None,
            from_block: None,
            to_block: None,
            from_time: None,
            to_time: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1_000;

impl TransferFilter {
    /// Clamp limit into `1..=1000` (default 100) and offset to `>= 0`.
    pub fn normalized(mut self) -> Self {
        let (limit, offset) = clamp_page(self.limit, self.offset);
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Clamp a caller-supplied page to the shared limit/offset rules.
pub fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    let limit = if limit <= 0 { DEFAULT_PAGE_LIMIT } else { limit.min(MAX_PAGE_LIMIT) };
    (limit, offset.max(0))
}

/// ERC-20 token being indexed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Token {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: i16,
    pub total_indexed_transfers: i64,
    pub first_seen_block: Option<i64>,
    pub last_seen_block: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-token indexing watermark.
///
/// `last_indexed_block` is the highest block whose logs for this token
/// have been fully inserted; it never decreases.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IndexerState {
    pub token_address: String,
    pub last_indexed_block: i64,
    pub is_backfilling: bool,
    pub backfill_from_block: Option<i64>,
    pub backfill_to_block: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

/// A holder's balance, derived from the transfer log as
/// `SUM(inbound) - SUM(outbound)`. The balance is a decimal string to
/// preserve 256-bit precision. Rank is 1-based over positive balances,
/// ordered by balance descending with ties broken by address ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderBalance {
    pub address: String,
    pub balance: String,
    pub rank: i64,
}

/// Aggregated transfer statistics for a token. Monetary aggregates are
/// decimal strings computed in integer space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStats {
    pub total_transfers: i64,
    pub unique_senders: i64,
    pub unique_receivers: i64,
    pub total_volume: String,
    pub transfers_24h: i64,
    pub volume_24h: String,
    pub transfers_7d: i64,
    pub volume_7d: String,
    pub first_transfer_at: Option<DateTime<Utc>>,
    pub last_transfer_at: Option<DateTime<Utc>>,
}

/// A single token position within a wallet portfolio.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenHolding {
    pub token_address: String,
    pub token_name: String,
    pub token_symbol: String,
    pub decimals: i16,
    pub balance: String,
}

/// Transfer activity summary for a wallet across all tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletSummary {
    pub transfers_in: i64,
    pub transfers_out: i64,
    pub volume_in: String,
    pub volume_out: String,
    pub unique_tokens: i64,
    pub first_transfer_at: Option<DateTime<Utc>>,
    pub last_transfer_at: Option<DateTime<Utc>>,
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(total: i64, limit: i64, offset: i64) -> Self {
        Self {
            total,
            limit,
            offset,
            has_more: offset + limit < total,
        }
    }
}

/// True for a `0x`-prefixed 40-hex-digit address (any case; callers
/// lowercase before storage).
pub fn is_valid_address(address: &str) -> bool {
    address.len() == 42
        && address.starts_with("0x")
        && address[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_normalization_clamps_limit_and_offset() {
        let f = TransferFilter { limit: 5_000, offset: -3, ..Default::default() }.normalized();
        assert_eq!(f.limit, MAX_PAGE_LIMIT);
        assert_eq!(f.offset, 0);

        let f = TransferFilter { limit: 0, ..Default::default() }.normalized();
        assert_eq!(f.limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn pagination_has_more() {
        assert!(Pagination::new(101, 100, 0).has_more);
        assert!(!Pagination::new(100, 100, 0).has_more);
        assert!(!Pagination::new(100, 100, 50).has_more);
        assert!(Pagination::new(201, 100, 100).has_more);
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address("0xdac17f958d2ee523a2206206994597c13d831ec7"));
        assert!(is_valid_address("0xdAC17F958D2ee523a2206206994597C13D831ec7"));
        assert!(!is_valid_address("dac17f958d2ee523a2206206994597c13d831ec7"));
        assert!(!is_valid_address("0xdac17f958d2ee523a2206206994597c13d831ec"));
        assert!(!is_valid_address("0xzzc17f958d2ee523a2206206994597c13d831ec7"));
        assert!(!is_valid_address(""));
    }
}
