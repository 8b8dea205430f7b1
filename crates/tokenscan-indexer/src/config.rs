use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokenscan_common::is_valid_address;

/// One-shot historical sweep requested through the environment.
#[derive(Debug, Clone)]
pub struct BackfillJob {
    pub token_address: String,
    pub from_block: i64,
    pub to_block: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_statement_timeout: Duration,
    pub rpc_url: String,
    pub chain_id: u64,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub token_addresses: Vec<String>,
    pub poll_interval: Duration,
    pub batch_size: i64,
    pub backfill_batch_size: i64,
    pub block_confirmations: u64,
    pub worker_count: usize,
    pub metrics_port: u16,
    pub backfill: Option<BackfillJob>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token_addresses: Vec<String> = env::var("INDEXER_TOKEN_ADDRESSES")
            .context("INDEXER_TOKEN_ADDRESSES must be set")?
            .split(',')
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();

        if token_addresses.is_empty() {
            bail!("INDEXER_TOKEN_ADDRESSES must list at least one token");
        }
        for address in &token_addresses {
            if !is_valid_address(address) {
                bail!("invalid token address in INDEXER_TOKEN_ADDRESSES: {address}");
            }
        }

        let config = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .context("Invalid DB_MAX_CONNECTIONS")?,
            db_statement_timeout: Duration::from_millis(
                env::var("DB_STATEMENT_TIMEOUT_MS")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .context("Invalid DB_STATEMENT_TIMEOUT_MS")?,
            ),
            rpc_url: env::var("ETH_RPC_URL").context("ETH_RPC_URL must be set")?,
            chain_id: env::var("ETH_CHAIN_ID")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .context("Invalid ETH_CHAIN_ID")?,
            request_timeout: Duration::from_secs(
                env::var("ETH_REQUEST_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .context("Invalid ETH_REQUEST_TIMEOUT_SECS")?,
            ),
            max_retries: env::var("ETH_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Invalid ETH_MAX_RETRIES")?,
            retry_delay: Duration::from_millis(
                env::var("ETH_RETRY_DELAY_MS")
                    .unwrap_or_else(|_| "1000".to_string())
                    .parse()
                    .context("Invalid ETH_RETRY_DELAY_MS")?,
            ),
            token_addresses,
            poll_interval: Duration::from_secs(
                env::var("INDEXER_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "12".to_string())
                    .parse()
                    .context("Invalid INDEXER_POLL_INTERVAL_SECS")?,
            ),
            batch_size: env::var("INDEXER_BATCH_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .context("Invalid INDEXER_BATCH_SIZE")?,
            backfill_batch_size: env::var("INDEXER_BACKFILL_BATCH_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("Invalid INDEXER_BACKFILL_BATCH_SIZE")?,
            block_confirmations: env::var("INDEXER_BLOCK_CONFIRMATIONS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .context("Invalid INDEXER_BLOCK_CONFIRMATIONS")?,
            worker_count: env::var("INDEXER_WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("Invalid INDEXER_WORKER_COUNT")?,
            metrics_port: env::var("INDEXER_METRICS_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid INDEXER_METRICS_PORT")?,
            backfill: Self::backfill_from_env()?,
        };

        if config.batch_size <= 0 || config.backfill_batch_size <= 0 {
            bail!("batch sizes must be positive");
        }
        if config.worker_count == 0 {
            bail!("INDEXER_WORKER_COUNT must be positive");
        }

        Ok(config)
    }

    fn backfill_from_env() -> Result<Option<BackfillJob>> {
        let Ok(token_address) = env::var("BACKFILL_TOKEN") else {
            return Ok(None);
        };

        let token_address = token_address.to_lowercase();
        if !is_valid_address(&token_address) {
            bail!("invalid BACKFILL_TOKEN address: {token_address}");
        }

        let from_block: i64 = env::var("BACKFILL_FROM_BLOCK")
            .context("BACKFILL_FROM_BLOCK must be set with BACKFILL_TOKEN")?
            .parse()
            .context("Invalid BACKFILL_FROM_BLOCK")?;
        let to_block: i64 = env::var("BACKFILL_TO_BLOCK")
            .context("BACKFILL_TO_BLOCK must be set with BACKFILL_TOKEN")?
            .parse()
            .context("Invalid BACKFILL_TO_BLOCK")?;

        if from_block < 0 || to_block < from_block {
            bail!("backfill range must satisfy 0 <= from <= to");
        }

        Ok(Some(BackfillJob { token_address, from_block, to_block }))
    }
}
