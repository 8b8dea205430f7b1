use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokenscan_common::{TokenscanError, Transfer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::ChainClient;
use crate::parser::parse_transfer_log;

/// A contiguous inclusive range of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: i64,
    pub to: i64,
}

/// Highest block the indexer treats as immutable.
pub fn safe_tip(latest: u64, confirmations: u64) -> i64 {
    (latest as i64 - confirmations as i64).max(0)
}

/// Split `[from, to]` into contiguous, non-overlapping batches in
/// ascending order. Empty when `from > to`.
pub fn split_block_range(from: i64, to: i64, batch_size: i64) -> Vec<BlockRange> {
    if from > to || batch_size <= 0 {
        return Vec::new();
    }

    let mut ranges = Vec::new();
    let mut current = from;
    while current <= to {
        ranges.push(BlockRange {
            from: current,
            to: (current + batch_size - 1).min(to),
        });
        current += batch_size;
    }
    ranges
}

/// Result of fetching transfers over a block range. Unparseable logs are
/// skipped and counted rather than failing the fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub transfers: Vec<Transfer>,
    pub from_block: i64,
    pub to_block: i64,
    pub failed_log_count: usize,
}

/// Source of parsed transfers for the indexer loop. The live fetcher
/// implements it against the chain; tests substitute scripted sources.
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// `latest - confirmations`, clamped to zero.
    async fn safe_block_number(&self) -> Result<i64, TokenscanError>;

    async fn fetch_transfers(
        &self,
        token_addresses: &[String],
        from: i64,
        to: i64,
    ) -> Result<FetchOutcome, TokenscanError>;
}

/// Fetches Transfer logs and resolves their block timestamps with a
/// bounded worker pool.
pub struct Fetcher {
    client: Arc<ChainClient>,
    block_confirmations: u64,
    worker_count: usize,
}

impl Fetcher {
    pub fn new(client: Arc<ChainClient>, block_confirmations: u64, worker_count: usize) -> Self {
        Self {
            client,
            block_confirmations,
            worker_count: worker_count.max(1),
        }
    }

    async fn resolve_timestamps(
        &self,
        block_numbers: BTreeSet<u64>,
    ) -> Result<HashMap<u64, DateTime<Utc>>, TokenscanError> {
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut tasks: JoinSet<Result<(u64, DateTime<Utc>), TokenscanError>> = JoinSet::new();

        for block_number in block_numbers {
            let client = Arc::clone(&self.client);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| TokenscanError::Internal(e.to_string()))?;
                let timestamp = client.block_timestamp(block_number).await?;
                Ok((block_number, timestamp))
            });
        }

        let mut timestamps = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (block_number, timestamp) =
                joined.map_err(|e| TokenscanError::Internal(e.to_string()))??;
            timestamps.insert(block_number, timestamp);
        }
        Ok(timestamps)
    }
}

#[async_trait]
impl TransferSource for Fetcher {
    async fn safe_block_number(&self) -> Result<i64, TokenscanError> {
        let latest = self.client.latest_block_number().await?;
        Ok(safe_tip(latest, self.block_confirmations))
    }

    async fn fetch_transfers(
        &self,
        token_addresses: &[String],
        from: i64,
        to: i64,
    ) -> Result<FetchOutcome, TokenscanError> {
        let addresses = token_addresses
            .iter()
            .map(|a| {
                Address::from_str(a)
                    .map_err(|e| TokenscanError::InvalidInput(format!("bad token address {a}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(from, to, tokens = token_addresses.len(), "Fetching logs");

        let logs = self
            .client
            .get_transfer_logs(from as u64, to as u64, addresses)
            .await?;

        if logs.is_empty() {
            return Ok(FetchOutcome {
                from_block: from,
                to_block: to,
                ..Default::default()
            });
        }

        let block_numbers: BTreeSet<u64> = logs.iter().filter_map(|l| l.block_number).collect();
        let timestamps = self.resolve_timestamps(block_numbers).await?;

        let (transfers, failed_log_count) = parse_logs(&logs, &timestamps);

        if failed_log_count > 0 {
            tracing::warn!(failed_log_count, total_logs = logs.len(), "Failed to parse some logs");
        }

        tracing::info!(from, to, transfer_count = transfers.len(), "Fetched transfers");

        Ok(FetchOutcome {
            transfers,
            from_block: from,
            to_block: to,
            failed_log_count,
        })
    }
}

/// Parse fetched logs against their resolved timestamps. Unparseable
/// logs (and logs whose block has no timestamp) are skipped and counted.
fn parse_logs(
    logs: &[Log],
    timestamps: &HashMap<u64, DateTime<Utc>>,
) -> (Vec<Transfer>, usize) {
    let mut transfers = Vec::with_capacity(logs.len());
    let mut failed_log_count = 0usize;

    for log in logs {
        match log.block_number.and_then(|n| timestamps.get(&n).copied()) {
            Some(timestamp) => match parse_transfer_log(log, timestamp) {
                Ok(transfer) => transfers.push(transfer),
                Err(e) => {
                    failed_log_count += 1;
                    tracing::debug!(
                        error = %e,
                        data = %hex::encode(&log.data().data),
                        "Skipping unparseable log",
                    );
                }
            },
            None => failed_log_count += 1,
        }
    }

    (transfers, failed_log_count)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256, Bytes, LogData, B256, U256};
    use chrono::Utc;

    use crate::parser::TRANSFER_EVENT_SIGNATURE;

    use super::*;

    #[test]
    fn safe_tip_subtracts_confirmations() {
        assert_eq!(safe_tip(100, 12), 88);
    }

    #[test]
    fn safe_tip_clamps_to_zero() {
        assert_eq!(safe_tip(5, 12), 0);
        assert_eq!(safe_tip(0, 0), 0);
    }

    #[test]
    fn split_covers_range_without_overlap() {
        let ranges = split_block_range(1, 250, 100);
        assert_eq!(
            ranges,
            vec![
                BlockRange { from: 1, to: 100 },
                BlockRange { from: 101, to: 200 },
                BlockRange { from: 201, to: 250 },
            ]
        );
    }

    #[test]
    fn split_single_block() {
        assert_eq!(split_block_range(7, 7, 100), vec![BlockRange { from: 7, to: 7 }]);
    }

    #[test]
    fn split_empty_when_inverted() {
        assert!(split_block_range(10, 5, 100).is_empty());
    }

    #[test]
    fn split_exact_multiple() {
        let ranges = split_block_range(0, 199, 100);
        assert_eq!(
            ranges,
            vec![BlockRange { from: 0, to: 99 }, BlockRange { from: 100, to: 199 }]
        );
    }

    fn address_topic(addr: Address) -> B256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(addr.as_slice());
        B256::from(word)
    }

    fn raw_log(index: u64, topics: Vec<B256>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: address!("dAC17F958D2ee523a2206206994597C13D831ec7"),
                data: LogData::new_unchecked(
                    topics,
                    Bytes::from(U256::from(1_000u64).to_be_bytes::<32>().to_vec()),
                ),
            },
            block_hash: None,
            block_number: Some(42),
            block_timestamp: None,
            transaction_hash: Some(b256!(
                "2222222222222222222222222222222222222222222222222222222222222222"
            )),
            transaction_index: Some(0),
            log_index: Some(index),
            removed: false,
        }
    }

    #[test]
    fn one_bad_log_among_nine_good() {
        let from = address_topic(address!("1111111111111111111111111111111111111111"));
        let to = address_topic(address!("2222222222222222222222222222222222222222"));

        let mut logs: Vec<Log> = (0..9)
            .map(|i| raw_log(i, vec![TRANSFER_EVENT_SIGNATURE, from, to]))
            .collect();
        // Two topics instead of three.
        logs.push(raw_log(9, vec![TRANSFER_EVENT_SIGNATURE, from]));

        let timestamps = HashMap::from([(42u64, Utc::now())]);
        let (transfers, failed_log_count) = parse_logs(&logs, &timestamps);

        assert_eq!(transfers.len(), 9);
        assert_eq!(failed_log_count, 1);
    }

    #[test]
    fn missing_timestamp_counts_as_failed() {
        let from = address_topic(address!("1111111111111111111111111111111111111111"));
        let to = address_topic(address!("2222222222222222222222222222222222222222"));
        let logs = vec![raw_log(0, vec![TRANSFER_EVENT_SIGNATURE, from, to])];

        let (transfers, failed_log_count) = parse_logs(&logs, &HashMap::new());
        assert!(transfers.is_empty());
        assert_eq!(failed_log_count, 1);
    }
}
