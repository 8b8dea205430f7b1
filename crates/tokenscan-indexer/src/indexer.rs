use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tokenscan_common::store::{StateStore, TokenStore, TransferStore};
use tokenscan_common::{IndexerState, Token};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::fetcher::{split_block_range, TransferSource};
use crate::metrics::IndexerMetrics;

const PLACEHOLDER_NAME: &str = "Unknown";
const PLACEHOLDER_SYMBOL: &str = "UNK";
const PLACEHOLDER_DECIMALS: i16 = 18;

/// Indexer loop configuration, a subset of the process [`Config`].
#[derive(Debug, Clone)]
pub struct IndexerSettings {
    pub token_addresses: Vec<String>,
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub backfill_batch_size: i64,
    pub worker_count: usize,
}

impl From<&Config> for IndexerSettings {
    fn from(config: &Config) -> Self {
        Self {
            token_addresses: config.token_addresses.clone(),
            poll_interval: config.poll_interval,
            batch_size: config.batch_size,
            backfill_batch_size: config.backfill_batch_size,
            worker_count: config.worker_count,
        }
    }
}

/// Orchestrates the indexing process: a periodic tick computes the safe
/// tip and fans out one task per configured token, each of which walks its
/// pending block ranges sequentially and advances the watermark after
/// every persisted batch.
#[derive(Clone)]
pub struct IndexerService {
    fetcher: Arc<dyn TransferSource>,
    transfers: Arc<dyn TransferStore>,
    tokens: Arc<dyn TokenStore>,
    state: Arc<dyn StateStore>,
    settings: IndexerSettings,
    metrics: Arc<IndexerMetrics>,
    cancel: CancellationToken,
}

impl IndexerService {
    pub fn new(
        fetcher: Arc<dyn TransferSource>,
        transfers: Arc<dyn TransferStore>,
        tokens: Arc<dyn TokenStore>,
        state: Arc<dyn StateStore>,
        settings: IndexerSettings,
        metrics: Arc<IndexerMetrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self { fetcher, transfers, tokens, state, settings, metrics, cancel }
    }

    /// Ensure every configured token has a registry row and a watermark.
    /// New tokens get placeholder metadata; a real refresh is the metadata
    /// provider's job and happens out of band.
    pub async fn initialize_tokens(&self) -> Result<()> {
        for address in &self.settings.token_addresses {
            let existing = self
                .tokens
                .get(address)
                .await
                .with_context(|| format!("failed to check token {address}"))?;

            if existing.is_none() {
                let token = Token {
                    address: address.clone(),
                    name: PLACEHOLDER_NAME.to_string(),
                    symbol: PLACEHOLDER_SYMBOL.to_string(),
                    decimals: PLACEHOLDER_DECIMALS,
                    total_indexed_transfers: 0,
                    first_seen_block: None,
                    last_seen_block: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                };
                self.tokens
                    .upsert(&token)
                    .await
                    .with_context(|| format!("failed to create token {address}"))?;

                let state = IndexerState {
                    token_address: address.clone(),
                    last_indexed_block: 0,
                    is_backfilling: false,
                    backfill_from_block: None,
                    backfill_to_block: None,
                    updated_at: Utc::now(),
                };
                self.state
                    .upsert(&state)
                    .await
                    .with_context(|| format!("failed to create indexer state for {address}"))?;

                tracing::info!(token = %address, "Initialized token");
            }
        }
        Ok(())
    }

    /// Run the live loop until the cancellation token fires. The first
    /// tick happens immediately; errors inside a tick are counted and
    /// logged, never fatal.
    pub async fn run(&self) {
        tracing::info!(tokens = ?self.settings.token_addresses, "Starting indexer loop");

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("Indexer loop stopped");
                    return;
                }
                _ = ticker.tick() => self.index_new_blocks().await,
            }
        }
    }

    /// One tick: compute the safe tip and index every configured token up
    /// to it, at most `worker_count` tokens at a time.
    pub async fn index_new_blocks(&self) {
        let started = Instant::now();

        let safe_tip = match self.fetcher.safe_block_number().await {
            Ok(tip) => tip,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get safe block number");
                self.metrics.errors.inc();
                return;
            }
        };

        let semaphore = Arc::new(Semaphore::new(self.settings.worker_count.max(1)));
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        for address in &self.settings.token_addresses {
            let service = self.clone();
            let address = address.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| anyhow!("worker pool closed: {e}"))?;
                service.index_token(&address, safe_tip).await
            });
        }

        let mut failed = false;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Error indexing transfers");
                    failed = true;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Indexing task panicked");
                    failed = true;
                }
            }
        }
        if failed {
            self.metrics.errors.inc();
        }

        self.metrics
            .indexing_latency_ms
            .set(started.elapsed().as_millis() as i64);
    }

    /// Index one token from its watermark up to `safe_tip`. Ranges are
    /// processed strictly in order; the watermark is advanced only after
    /// the range's batch is persisted, so a crash or cancellation replays
    /// at most one range and the uniqueness constraint absorbs the
    /// duplicates.
    async fn index_token(&self, token_address: &str, safe_tip: i64) -> Result<()> {
        let state = self
            .state
            .get(token_address)
            .await
            .context("failed to get indexer state")?
            .ok_or_else(|| anyhow!("indexer state not found for {token_address}"))?;

        let from = state.last_indexed_block + 1;
        if from > safe_tip {
            return Ok(());
        }

        for range in split_block_range(from, safe_tip, self.settings.batch_size) {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let outcome = self
                .fetcher
                .fetch_transfers(&[token_address.to_string()], range.from, range.to)
                .await
                .with_context(|| {
                    format!("failed to fetch transfers for blocks {}-{}", range.from, range.to)
                })?;

            let mut inserted = 0u64;
            if !outcome.transfers.is_empty() {
                inserted = self
                    .transfers
                    .batch_insert(&outcome.transfers)
                    .await
                    .context("failed to insert transfers")?;

                // Stats are advisory; a failure must not stall the
                // watermark.
                if let Err(e) = self
                    .tokens
                    .update_stats(token_address, inserted as i64, range.to)
                    .await
                {
                    tracing::warn!(token = token_address, error = %e, "Failed to update token stats");
                }
            }

            self.state
                .update_last_block(token_address, range.to)
                .await
                .context("failed to update checkpoint")?;

            self.metrics
                .record_batch((range.to - range.from + 1) as u64, inserted, range.to);

            tracing::debug!(
                token = token_address,
                from = range.from,
                to = range.to,
                transfers = outcome.transfers.len(),
                "Indexed block range",
            );
        }

        Ok(())
    }

    /// Sweep a historical range for one token. Runs independently of the
    /// live loop and never touches `last_indexed_block`; inserts colliding
    /// with already-indexed blocks are absorbed by the uniqueness
    /// constraint.
    pub async fn backfill(&self, token_address: &str, from: i64, to: i64) -> Result<()> {
        let token_address = token_address.to_lowercase();
        tracing::info!(token = %token_address, from, to, "Starting backfill");

        self.state
            .set_backfilling(&token_address, true, Some(from), Some(to))
            .await
            .context("failed to set backfilling state")?;

        let result = self.run_backfill(&token_address, from, to).await;

        if let Err(e) = self.state.set_backfilling(&token_address, false, None, None).await {
            tracing::warn!(token = %token_address, error = %e, "Failed to clear backfilling state");
        }

        result
    }

    async fn run_backfill(&self, token_address: &str, from: i64, to: i64) -> Result<()> {
        let ranges = split_block_range(from, to, self.settings.backfill_batch_size);
        let total_batches = ranges.len();

        for (i, range) in ranges.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let outcome = self
                .fetcher
                .fetch_transfers(&[token_address.to_string()], range.from, range.to)
                .await
                .with_context(|| {
                    format!("backfill failed at blocks {}-{}", range.from, range.to)
                })?;

            if !outcome.transfers.is_empty() {
                self.transfers
                    .batch_insert(&outcome.transfers)
                    .await
                    .context("failed to insert backfill transfers")?;
            }

            tracing::info!(
                token = token_address,
                batch = i + 1,
                total_batches,
                from = range.from,
                to = range.to,
                transfers = outcome.transfers.len(),
                "Backfill progress",
            );
        }

        tracing::info!(token = token_address, from, to, "Backfill completed");
        Ok(())
    }
}
