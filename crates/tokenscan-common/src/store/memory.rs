use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::error::TokenscanError;
use crate::store::tokens::sanitize_token_sort;
use crate::store::{PortfolioStore, StateStore, TokenStore, TransferStore};
use crate::types::{
    HolderBalance, IndexerState, Token, TokenHolding, TokenStats, Transfer, TransferFilter,
    WalletSummary,
};

/// In-memory implementation of all four stores, used by tests and local
/// development. Read semantics (ordering, tie-breaking, pagination,
/// signed-sum balances) match the Postgres implementations.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    transfers: Vec<Transfer>,
    transfer_keys: HashSet<(String, i32, i64)>,
    tokens: HashMap<String, Token>,
    states: HashMap<String, IndexerState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn transfer_key(t: &Transfer) -> (String, i32, i64) {
    (t.tx_hash.clone(), t.log_index, t.block_timestamp.timestamp_micros())
}

fn matches(t: &Transfer, f: &TransferFilter) -> bool {
    if let Some(token) = &f.token_address {
        if &t.token_address != token {
            return false;
        }
    }
    if let Some(from) = &f.from_address {
        if &t.from_address != from {
            return false;
        }
    }
    if let Some(to) = &f.to_address {
        if &t.to_address != to {
            return false;
        }
    }
    if let Some(addr) = &f.address {
        if &t.from_address != addr && &t.to_address != addr {
            return false;
        }
    }
    if let Some(from_block) = f.from_block {
        if t.block_number < from_block {
            return false;
        }
    }
    if let Some(to_block) = f.to_block {
        if t.block_number > to_block {
            return false;
        }
    }
    if let Some(from_time) = f.from_time {
        if t.block_timestamp < from_time {
            return false;
        }
    }
    if let Some(to_time) = f.to_time {
        if t.block_timestamp > to_time {
            return false;
        }
    }
    true
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

impl Inner {
    /// Signed-sum balance per address for one token, all addresses that
    /// ever moved the token. BTreeMap keeps the address tie-break ordering
    /// deterministic.
    fn balances(&self, token_address: &str) -> BTreeMap<String, BigDecimal> {
        let mut balances: BTreeMap<String, BigDecimal> = BTreeMap::new();
        for t in self.transfers.iter().filter(|t| t.token_address == token_address) {
            *balances.entry(t.to_address.clone()).or_default() += &t.value;
            *balances.entry(t.from_address.clone()).or_default() -= &t.value;
        }
        balances
    }

    /// Positive holders ordered by `(balance DESC, address ASC)`.
    fn ranked_holders(&self, token_address: &str) -> Vec<(String, BigDecimal)> {
        let zero = BigDecimal::from(0);
        let mut holders: Vec<(String, BigDecimal)> = self
            .balances(token_address)
            .into_iter()
            .filter(|(_, balance)| *balance > zero)
            .collect();
        holders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        holders
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn get_by_filter(
        &self,
        filter: &TransferFilter,
    ) -> Result<Vec<Transfer>, TokenscanError> {
        let inner = self.inner.read().await;
        let mut matched: Vec<Transfer> = inner
            .transfers
            .iter()
            .filter(|t| matches(t, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.block_timestamp
                .cmp(&a.block_timestamp)
                .then_with(|| b.log_index.cmp(&a.log_index))
        });
        Ok(page(matched, filter.limit, filter.offset))
    }

    async fn get_count(&self, filter: &TransferFilter) -> Result<i64, TokenscanError> {
        let inner = self.inner.read().await;
        Ok(inner.transfers.iter().filter(|t| matches(t, filter)).count() as i64)
    }

    async fn batch_insert(&self, transfers: &[Transfer]) -> Result<u64, TokenscanError> {
        let mut inner = self.inner.write().await;
        let mut inserted = 0u64;
        for t in transfers {
            let mut row = t.clone();
            row.token_address = row.token_address.to_lowercase();
            row.from_address = row.from_address.to_lowercase();
            row.to_address = row.to_address.to_lowercase();
            if inner.transfer_keys.insert(transfer_key(&row)) {
                inner.transfers.push(row);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn get_latest_block(&self, token_address: &str) -> Result<i64, TokenscanError> {
        let inner = self.inner.read().await;
        Ok(inner
            .transfers
            .iter()
            .filter(|t| t.token_address == token_address)
            .map(|t| t.block_number)
            .max()
            .unwrap_or(0))
    }

    async fn get_token_stats(&self, token_address: &str) -> Result<TokenStats, TokenscanError> {
        let inner = self.inner.read().await;
        let now = Utc::now();
        let day_ago = now - Duration::hours(24);
        let week_ago = now - Duration::days(7);

        let mut stats = TokenStats {
            total_transfers: 0,
            unique_senders: 0,
            unique_receivers: 0,
            total_volume: String::new(),
            transfers_24h: 0,
            volume_24h: String::new(),
            transfers_7d: 0,
            volume_7d: String::new(),
            first_transfer_at: None,
            last_transfer_at: None,
        };

        let mut senders = HashSet::new();
        let mut receivers = HashSet::new();
        let mut total = BigDecimal::from(0);
        let mut volume_24h = BigDecimal::from(0);
        let mut volume_7d = BigDecimal::from(0);

        for t in inner.transfers.iter().filter(|t| t.token_address == token_address) {
            stats.total_transfers += 1;
            senders.insert(&t.from_address);
            receivers.insert(&t.to_address);
            total += &t.value;
            if t.block_timestamp >= day_ago {
                stats.transfers_24h += 1;
                volume_24h += &t.value;
            }
            if t.block_timestamp >= week_ago {
                stats.transfers_7d += 1;
                volume_7d += &t.value;
            }
            stats.first_transfer_at = Some(match stats.first_transfer_at {
                Some(ts) => ts.min(t.block_timestamp),
                None => t.block_timestamp,
            });
            stats.last_transfer_at = Some(match stats.last_transfer_at {
                Some(ts) => ts.max(t.block_timestamp),
                None => t.block_timestamp,
            });
        }

        stats.unique_senders = senders.len() as i64;
        stats.unique_receivers = receivers.len() as i64;
        stats.total_volume = total.to_string();
        stats.volume_24h = volume_24h.to_string();
        stats.volume_7d = volume_7d.to_string();
        Ok(stats)
    }

    async fn get_top_holders(
        &self,
        token_address: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<HolderBalance>, TokenscanError> {
        let inner = self.inner.read().await;
        let ranked: Vec<HolderBalance> = inner
            .ranked_holders(token_address)
            .into_iter()
            .enumerate()
            .map(|(i, (address, balance))| HolderBalance {
                address,
                balance: balance.to_string(),
                rank: i as i64 + 1,
            })
            .collect();
        Ok(page(ranked, limit, offset))
    }

    async fn get_holder_count(&self, token_address: &str) -> Result<i64, TokenscanError> {
        let inner = self.inner.read().await;
        Ok(inner.ranked_holders(token_address).len() as i64)
    }

    async fn get_holder_balance(
        &self,
        token_address: &str,
        holder_address: &str,
    ) -> Result<HolderBalance, TokenscanError> {
        let inner = self.inner.read().await;
        let balance = inner
            .balances(token_address)
            .remove(holder_address)
            .unwrap_or_else(|| BigDecimal::from(0));

        let rank = inner
            .ranked_holders(token_address)
            .iter()
            .filter(|(address, held)| {
                *held > balance || (*held == balance && address.as_str() < holder_address)
            })
            .count() as i64
            + 1;

        Ok(HolderBalance {
            address: holder_address.to_string(),
            balance: balance.to_string(),
            rank,
        })
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get(&self, address: &str) -> Result<Option<Token>, TokenscanError> {
        let inner = self.inner.read().await;
        Ok(inner.tokens.get(address).cloned())
    }

    async fn upsert(&self, token: &Token) -> Result<(), TokenscanError> {
        let mut inner = self.inner.write().await;
        let address = token.address.to_lowercase();
        match inner.tokens.entry(address.clone()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.name = token.name.clone();
                existing.symbol = token.symbol.clone();
                existing.decimals = token.decimals;
                existing.updated_at = Utc::now();
            }
            Entry::Vacant(entry) => {
                let mut row = token.clone();
                row.address = address;
                row.total_indexed_transfers = 0;
                row.created_at = Utc::now();
                row.updated_at = row.created_at;
                entry.insert(row);
            }
        }
        Ok(())
    }

    async fn get_all_paginated(
        &self,
        limit: i64,
        offset: i64,
        sort_by: &str,
        sort_order: &str,
    ) -> Result<(Vec<Token>, i64), TokenscanError> {
        let inner = self.inner.read().await;
        let (column, order) = sanitize_token_sort(sort_by, sort_order);

        let mut tokens: Vec<Token> = inner.tokens.values().cloned().collect();
        let total = tokens.len() as i64;
        tokens.sort_by(|a, b| {
            let ordering = compare_tokens(a, b, column);
            if order == "DESC" {
                ordering.reverse()
            } else {
                ordering
            }
        });

        Ok((page(tokens, limit, offset), total))
    }

    async fn count(&self) -> Result<i64, TokenscanError> {
        let inner = self.inner.read().await;
        Ok(inner.tokens.len() as i64)
    }

    async fn update_stats(
        &self,
        address: &str,
        transfer_delta: i64,
        last_block: i64,
    ) -> Result<(), TokenscanError> {
        let mut inner = self.inner.write().await;
        if let Some(token) = inner.tokens.get_mut(address) {
            token.total_indexed_transfers += transfer_delta;
            token.last_seen_block = Some(token.last_seen_block.unwrap_or(0).max(last_block));
            token.updated_at = Utc::now();
        }
        Ok(())
    }
}

fn compare_tokens(a: &Token, b: &Token, column: &str) -> Ordering {
    match column {
        "address" => a.address.cmp(&b.address),
        "name" => a.name.cmp(&b.name),
        "symbol" => a.symbol.cmp(&b.symbol),
        "decimals" => a.decimals.cmp(&b.decimals),
        "first_seen_block" => a.first_seen_block.cmp(&b.first_seen_block),
        "last_seen_block" => a.last_seen_block.cmp(&b.last_seen_block),
        "created_at" => a.created_at.cmp(&b.created_at),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.total_indexed_transfers.cmp(&b.total_indexed_transfers),
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, token_address: &str) -> Result<Option<IndexerState>, TokenscanError> {
        let inner = self.inner.read().await;
        Ok(inner.states.get(token_address).cloned())
    }

    async fn upsert(&self, state: &IndexerState) -> Result<(), TokenscanError> {
        let mut inner = self.inner.write().await;
        let mut row = state.clone();
        row.token_address = row.token_address.to_lowercase();
        row.updated_at = Utc::now();
        inner.states.insert(row.token_address.clone(), row);
        Ok(())
    }

    async fn update_last_block(
        &self,
        token_address: &str,
        block_number: i64,
    ) -> Result<(), TokenscanError> {
        let mut inner = self.inner.write().await;
        match inner.states.entry(token_address.to_string()) {
            Entry::Occupied(mut entry) => {
                let state = entry.get_mut();
                state.last_indexed_block = block_number;
                state.updated_at = Utc::now();
            }
            Entry::Vacant(entry) => {
                entry.insert(IndexerState {
                    token_address: token_address.to_string(),
                    last_indexed_block: block_number,
                    is_backfilling: false,
                    backfill_from_block: None,
                    backfill_to_block: None,
                    updated_at: Utc::now(),
                });
            }
        }
        Ok(())
    }

    async fn set_backfilling(
        &self,
        token_address: &str,
        is_backfilling: bool,
        from_block: Option<i64>,
        to_block: Option<i64>,
    ) -> Result<(), TokenscanError> {
        let mut inner = self.inner.write().await;
        if let Some(state) = inner.states.get_mut(token_address) {
            state.is_backfilling = is_backfilling;
            state.backfill_from_block = from_block;
            state.backfill_to_block = to_block;
            state.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl PortfolioStore for MemoryStore {
    async fn wallet_holdings(
        &self,
        wallet_address: &str,
    ) -> Result<Vec<TokenHolding>, TokenscanError> {
        let inner = self.inner.read().await;
        let zero = BigDecimal::from(0);

        let mut balances: BTreeMap<String, BigDecimal> = BTreeMap::new();
        for t in &inner.transfers {
            if t.to_address == wallet_address {
                *balances.entry(t.token_address.clone()).or_default() += &t.value;
            }
            if t.from_address == wallet_address {
                *balances.entry(t.token_address.clone()).or_default() -= &t.value;
            }
        }

        // Mirrors the SQL join: unregistered tokens are dropped.
        let mut holdings: Vec<(TokenHolding, BigDecimal)> = balances
            .into_iter()
            .filter(|(_, balance)| *balance > zero)
            .filter_map(|(token_address, balance)| {
                inner.tokens.get(&token_address).map(|token| {
                    (
                        TokenHolding {
                            token_address,
                            token_name: token.name.clone(),
                            token_symbol: token.symbol.clone(),
                            decimals: token.decimals,
                            balance: balance.to_string(),
                        },
                        balance,
                    )
                })
            })
            .collect();
        holdings.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(holdings.into_iter().map(|(h, _)| h).collect())
    }

    async fn wallet_holding_by_token(
        &self,
        wallet_address: &str,
        token_address: &str,
    ) -> Result<Option<TokenHolding>, TokenscanError> {
        let inner = self.inner.read().await;
        let Some(token) = inner.tokens.get(token_address) else {
            return Ok(None);
        };

        let mut balance = BigDecimal::from(0);
        for t in inner.transfers.iter().filter(|t| t.token_address == token_address) {
            if t.to_address == wallet_address {
                balance += &t.value;
            }
            if t.from_address == wallet_address {
                balance -= &t.value;
            }
        }

        Ok(Some(TokenHolding {
            token_address: token.address.clone(),
            token_name: token.name.clone(),
            token_symbol: token.symbol.clone(),
            decimals: token.decimals,
            balance: balance.to_string(),
        }))
    }

    async fn wallet_summary(
        &self,
        wallet_address: &str,
    ) -> Result<WalletSummary, TokenscanError> {
        let inner = self.inner.read().await;

        let mut summary = WalletSummary {
            transfers_in: 0,
            transfers_out: 0,
            volume_in: String::new(),
            volume_out: String::new(),
            unique_tokens: 0,
            first_transfer_at: None,
            last_transfer_at: None,
        };

        let mut volume_in = BigDecimal::from(0);
        let mut volume_out = BigDecimal::from(0);
        let mut tokens = HashSet::new();

        for t in &inner.transfers {
            let inbound = t.to_address == wallet_address;
            let outbound = t.from_address == wallet_address;
            if !inbound && !outbound {
                continue;
            }
            if inbound {
                summary.transfers_in += 1;
                volume_in += &t.value;
            }
            if outbound {
                summary.transfers_out += 1;
                volume_out += &t.value;
            }
            tokens.insert(&t.token_address);
            summary.first_transfer_at = Some(match summary.first_transfer_at {
                Some(ts) => ts.min(t.block_timestamp),
                None => t.block_timestamp,
            });
            summary.last_transfer_at = Some(match summary.last_transfer_at {
                Some(ts) => ts.max(t.block_timestamp),
                None => t.block_timestamp,
            });
        }

        summary.volume_in = volume_in.to_string();
        summary.volume_out = volume_out.to_string();
        summary.unique_tokens = tokens.len() as i64;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    const USDT: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
    const ALICE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BOB: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const CAROL: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

    fn transfer(
        tx_hash: &str,
        log_index: i32,
        block: i64,
        from: &str,
        to: &str,
        value: &str,
    ) -> Transfer {
        Transfer {
            tx_hash: tx_hash.to_string(),
            log_index,
            block_number: block,
            block_timestamp: Utc::now() - Duration::hours(1) + Duration::seconds(block),
            token_address: USDT.to_string(),
            from_address: from.to_string(),
            to_address: to.to_string(),
            value: BigDecimal::from_str(value).unwrap(),
        }
    }

    fn usdt_token() -> Token {
        Token {
            address: USDT.to_string(),
            name: "Tether USD".to_string(),
            symbol: "USDT".to_string(),
            decimals: 6,
            total_indexed_transfers: 0,
            first_seen_block: None,
            last_seen_block: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn batch_insert_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![
            transfer("0x01", 0, 10, ALICE, BOB, "100"),
            transfer("0x02", 1, 11, BOB, CAROL, "40"),
        ];

        assert_eq!(store.batch_insert(&batch).await.unwrap(), 2);
        assert_eq!(store.batch_insert(&batch).await.unwrap(), 0);
        assert_eq!(store.get_count(&TransferFilter::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insert_lowercases_addresses() {
        let store = MemoryStore::new();
        let mut t = transfer("0x01", 0, 10, ALICE, BOB, "100");
        t.from_address = ALICE.to_uppercase().replace("0X", "0x");
        store.batch_insert(&[t]).await.unwrap();

        let rows = store.get_by_filter(&TransferFilter::default()).await.unwrap();
        assert_eq!(rows[0].from_address, ALICE);
    }

    #[tokio::test]
    async fn filter_ordering_is_timestamp_then_log_index_descending() {
        let store = MemoryStore::new();
        let mut a = transfer("0x01", 2, 10, ALICE, BOB, "1");
        let mut b = transfer("0x01", 7, 10, ALICE, BOB, "2");
        let c = transfer("0x02", 0, 50, ALICE, BOB, "3");
        // Same block, same timestamp: log_index decides.
        b.block_timestamp = a.block_timestamp;
        a.block_number = 10;
        b.block_number = 10;
        store.batch_insert(&[a, b, c]).await.unwrap();

        let rows = store.get_by_filter(&TransferFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].tx_hash, "0x02");
        assert_eq!(rows[1].log_index, 7);
        assert_eq!(rows[2].log_index, 2);
    }

    #[tokio::test]
    async fn either_endpoint_filter() {
        let store = MemoryStore::new();
        store
            .batch_insert(&[
                transfer("0x01", 0, 10, ALICE, BOB, "1"),
                transfer("0x02", 0, 11, BOB, CAROL, "1"),
                transfer("0x03", 0, 12, CAROL, ALICE, "1"),
            ])
            .await
            .unwrap();

        let filter = TransferFilter {
            address: Some(BOB.to_string()),
            ..Default::default()
        };
        assert_eq!(store.get_count(&filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn holder_arithmetic_matches_signed_sum() {
        // A→B 100, B→C 40, A→C 10: A = -110, B = 60, C = 50.
        let store = MemoryStore::new();
        store
            .batch_insert(&[
                transfer("0x01", 0, 10, ALICE, BOB, "100"),
                transfer("0x02", 0, 11, BOB, CAROL, "40"),
                transfer("0x03", 0, 12, ALICE, CAROL, "10"),
            ])
            .await
            .unwrap();

        let holders = store.get_top_holders(USDT, 10, 0).await.unwrap();
        assert_eq!(holders.len(), 2);
        assert_eq!(holders[0].address, BOB);
        assert_eq!(holders[0].balance, "60");
        assert_eq!(holders[0].rank, 1);
        assert_eq!(holders[1].address, CAROL);
        assert_eq!(holders[1].balance, "50");
        assert_eq!(holders[1].rank, 2);

        assert_eq!(store.get_holder_count(USDT).await.unwrap(), 2);

        let alice = store.get_holder_balance(USDT, ALICE).await.unwrap();
        assert_eq!(alice.balance, "-110");
        assert_eq!(alice.rank, 3);
    }

    #[tokio::test]
    async fn rank_is_total_with_address_tie_break() {
        let store = MemoryStore::new();
        let minter = "0x0000000000000000000000000000000000000000";
        store
            .batch_insert(&[
                transfer("0x01", 0, 1, minter, CAROL, "50"),
                transfer("0x02", 0, 2, minter, ALICE, "50"),
                transfer("0x03", 0, 3, minter, BOB, "70"),
            ])
            .await
            .unwrap();

        let holders = store.get_top_holders(USDT, 10, 0).await.unwrap();
        let ranks: Vec<i64> = holders.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        // Equal balances are ordered by address ascending.
        assert_eq!(holders[1].address, ALICE);
        assert_eq!(holders[2].address, CAROL);

        // Individual lookups agree with the ranking query.
        assert_eq!(store.get_holder_balance(USDT, ALICE).await.unwrap().rank, 2);
        assert_eq!(store.get_holder_balance(USDT, CAROL).await.unwrap().rank, 3);
    }

    #[tokio::test]
    async fn top_holders_pagination() {
        let store = MemoryStore::new();
        let minter = "0x0000000000000000000000000000000000000000";
        store
            .batch_insert(&[
                transfer("0x01", 0, 1, minter, ALICE, "30"),
                transfer("0x02", 0, 2, minter, BOB, "20"),
                transfer("0x03", 0, 3, minter, CAROL, "10"),
            ])
            .await
            .unwrap();

        let second_page = store.get_top_holders(USDT, 1, 1).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].address, BOB);
        assert_eq!(second_page[0].rank, 2);
    }

    #[tokio::test]
    async fn latest_block_is_zero_when_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.get_latest_block(USDT).await.unwrap(), 0);

        store
            .batch_insert(&[
                transfer("0x01", 0, 10, ALICE, BOB, "1"),
                transfer("0x02", 0, 55, ALICE, BOB, "1"),
            ])
            .await
            .unwrap();
        assert_eq!(store.get_latest_block(USDT).await.unwrap(), 55);
    }

    #[tokio::test]
    async fn token_stats_windows() {
        let store = MemoryStore::new();
        let mut recent = transfer("0x01", 0, 10, ALICE, BOB, "100");
        recent.block_timestamp = Utc::now() - Duration::hours(1);
        let mut this_week = transfer("0x02", 0, 11, ALICE, BOB, "200");
        this_week.block_timestamp = Utc::now() - Duration::days(3);
        let mut ancient = transfer("0x03", 0, 12, BOB, CAROL, "300");
        ancient.block_timestamp = Utc::now() - Duration::days(30);
        store.batch_insert(&[recent, this_week, ancient]).await.unwrap();

        let stats = store.get_token_stats(USDT).await.unwrap();
        assert_eq!(stats.total_transfers, 3);
        assert_eq!(stats.unique_senders, 2);
        assert_eq!(stats.unique_receivers, 2);
        assert_eq!(stats.total_volume, "600");
        assert_eq!(stats.transfers_24h, 1);
        assert_eq!(stats.volume_24h, "100");
        assert_eq!(stats.transfers_7d, 2);
        assert_eq!(stats.volume_7d, "300");
        assert!(stats.first_transfer_at.unwrap() < stats.last_transfer_at.unwrap());
    }

    #[tokio::test]
    async fn token_upsert_preserves_counters() {
        let store = MemoryStore::new();
        TokenStore::upsert(&store, &usdt_token()).await.unwrap();
        store.update_stats(USDT, 5, 120).await.unwrap();

        let mut refreshed = usdt_token();
        refreshed.name = "Tether".to_string();
        TokenStore::upsert(&store, &refreshed).await.unwrap();

        let token = TokenStore::get(&store, USDT).await.unwrap().unwrap();
        assert_eq!(token.name, "Tether");
        assert_eq!(token.total_indexed_transfers, 5);
        assert_eq!(token.last_seen_block, Some(120));
    }

    #[tokio::test]
    async fn update_stats_raises_last_seen_monotonically() {
        let store = MemoryStore::new();
        TokenStore::upsert(&store, &usdt_token()).await.unwrap();
        store.update_stats(USDT, 1, 100).await.unwrap();
        store.update_stats(USDT, 1, 50).await.unwrap();

        let token = TokenStore::get(&store, USDT).await.unwrap().unwrap();
        assert_eq!(token.total_indexed_transfers, 2);
        assert_eq!(token.last_seen_block, Some(100));
    }

    #[tokio::test]
    async fn update_last_block_initializes_missing_state() {
        let store = MemoryStore::new();
        store.update_last_block(USDT, 88).await.unwrap();

        let state = StateStore::get(&store, USDT).await.unwrap().unwrap();
        assert_eq!(state.last_indexed_block, 88);
        assert!(!state.is_backfilling);
    }

    #[tokio::test]
    async fn wallet_holdings_and_summary() {
        let store = MemoryStore::new();
        TokenStore::upsert(&store, &usdt_token()).await.unwrap();
        store
            .batch_insert(&[
                transfer("0x01", 0, 10, ALICE, BOB, "100"),
                transfer("0x02", 0, 11, BOB, CAROL, "40"),
            ])
            .await
            .unwrap();

        let holdings = store.wallet_holdings(BOB).await.unwrap();
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].token_symbol, "USDT");
        assert_eq!(holdings[0].balance, "60");

        // Alice's balance is negative: no holdings.
        assert!(store.wallet_holdings(ALICE).await.unwrap().is_empty());

        let summary = store.wallet_summary(BOB).await.unwrap();
        assert_eq!(summary.transfers_in, 1);
        assert_eq!(summary.transfers_out, 1);
        assert_eq!(summary.volume_in, "100");
        assert_eq!(summary.volume_out, "40");
        assert_eq!(summary.unique_tokens, 1);

        let holding = store.wallet_holding_by_token(CAROL, USDT).await.unwrap().unwrap();
        assert_eq!(holding.balance, "40");
        assert!(store
            .wallet_holding_by_token(CAROL, "0x1111111111111111111111111111111111111111")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn token_listing_sorts_and_paginates() {
        let store = MemoryStore::new();
        let mut a = usdt_token();
        a.address = "0x1111111111111111111111111111111111111111".to_string();
        a.symbol = "AAA".to_string();
        let mut b = usdt_token();
        b.address = "0x2222222222222222222222222222222222222222".to_string();
        b.symbol = "BBB".to_string();
        TokenStore::upsert(&store, &a).await.unwrap();
        TokenStore::upsert(&store, &b).await.unwrap();
        store.update_stats(&b.address, 10, 5).await.unwrap();

        let (tokens, total) = store.get_all_paginated(10, 0, "symbol", "asc").await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(tokens[0].symbol, "AAA");

        // Unknown sort column falls back to transfer count descending.
        let (tokens, _) = store.get_all_paginated(10, 0, "bogus", "desc").await.unwrap();
        assert_eq!(tokens[0].symbol, "BBB");

        let (tokens, total) = store.get_all_paginated(1, 1, "symbol", "asc").await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].symbol, "BBB");
    }
}
