//! Store capabilities and their implementations.
//!
//! The four repositories are defined by trait so the indexer and API can
//! run against Postgres in production and the in-memory implementations in
//! tests. All implementations share the same read semantics: ordering,
//! tie-breaking and pagination behave identically.

mod memory;
mod portfolio;
mod state;
mod tokens;
mod transfers;

pub use memory::MemoryStore;
pub use portfolio::PgPortfolioStore;
pub use state::PgStateStore;
pub use tokens::PgTokenStore;
pub use transfers::PgTransferStore;

use async_trait::async_trait;

use crate::error::TokenscanError;
use crate::types::{
    HolderBalance, IndexerState, Token, TokenHolding, TokenStats, Transfer, TransferFilter,
    WalletSummary,
};

/// Append-only log of indexed transfers plus the derived-state reads
/// computed from it.
#[async_trait]
pub trait TransferStore: Send + Sync {
    /// Transfers matching the filter, ordered by
    /// `(block_timestamp DESC, log_index DESC)`.
    async fn get_by_filter(&self, filter: &TransferFilter)
        -> Result<Vec<Transfer>, TokenscanError>;

    /// Count of transfers matching the filter (limit/offset ignored).
    async fn get_count(&self, filter: &TransferFilter) -> Result<i64, TokenscanError>;

    /// Insert a batch in one transaction. Rows already present (same
    /// `tx_hash`, `log_index`, `block_timestamp`) are skipped, which makes
    /// overlapping ranges safe to submit. Returns the number of rows
    /// actually inserted.
    async fn batch_insert(&self, transfers: &[Transfer]) -> Result<u64, TokenscanError>;

    /// Highest indexed `block_number` for a token, 0 when none.
    async fn get_latest_block(&self, token_address: &str) -> Result<i64, TokenscanError>;

    /// All-time, 24h and 7d aggregates for a token.
    async fn get_token_stats(&self, token_address: &str) -> Result<TokenStats, TokenscanError>;

    /// Positive-balance holders ranked by balance descending, ties broken
    /// by address ascending.
    async fn get_top_holders(
        &self,
        token_address: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HolderBalance>, TokenscanError>;

    /// Number of addresses with a positive balance.
    async fn get_holder_count(&self, token_address: &str) -> Result<i64, TokenscanError>;

    /// Signed-sum balance for one holder. The balance may be zero or
    /// negative; rank is computed against the positive-holder ranking, so
    /// a non-holder ranks after every holder.
    async fn get_holder_balance(
        &self,
        token_address: &str,
        holder_address: &str,
    ) -> Result<HolderBalance, TokenscanError>;
}

/// Registry of indexed tokens and their counters.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, address: &str) -> Result<Option<Token>, TokenscanError>;

    /// Create or update a token. On conflict the metadata columns are
    /// replaced but `total_indexed_transfers` and the seen-block counters
    /// are preserved.
    async fn upsert(&self, token: &Token) -> Result<(), TokenscanError>;

    /// Paginated listing. `sort_by` and `sort_order` are validated against
    /// a whitelist; anything else falls back to
    /// `total_indexed_transfers DESC`.
    async fn get_all_paginated(
        &self,
        limit: i64,
        offset: i64,
        sort_by: &str,
        sort_order: &str,
    ) -> Result<(Vec<Token>, i64), TokenscanError>;

    async fn count(&self) -> Result<i64, TokenscanError>;

    /// Add `transfer_delta` to `total_indexed_transfers` and raise
    /// `last_seen_block` to at least `last_block`.
    async fn update_stats(
        &self,
        address: &str,
        transfer_delta: i64,
        last_block: i64,
    ) -> Result<(), TokenscanError>;
}

/// Per-token watermark storage.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, token_address: &str) -> Result<Option<IndexerState>, TokenscanError>;

    async fn upsert(&self, state: &IndexerState) -> Result<(), TokenscanError>;

    /// Advance the watermark. Creates the row when missing.
    async fn update_last_block(
        &self,
        token_address: &str,
        block_number: i64,
    ) -> Result<(), TokenscanError>;

    async fn set_backfilling(
        &self,
        token_address: &str,
        is_backfilling: bool,
        from_block: Option<i64>,
        to_block: Option<i64>,
    ) -> Result<(), TokenscanError>;
}

/// Wallet-centric reads across all tokens.
#[async_trait]
pub trait PortfolioStore: Send + Sync {
    /// Holdings with positive balance, joined with token metadata, ordered
    /// by balance descending.
    async fn wallet_holdings(
        &self,
        wallet_address: &str,
    ) -> Result<Vec<TokenHolding>, TokenscanError>;

    /// Holding for one token; `None` when the token is not registered.
    async fn wallet_holding_by_token(
        &self,
        wallet_address: &str,
        token_address: &str,
    ) -> Result<Option<TokenHolding>, TokenscanError>;

    async fn wallet_summary(&self, wallet_address: &str)
        -> Result<WalletSummary, TokenscanError>;
}
