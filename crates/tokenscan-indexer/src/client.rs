use std::future::Future;
use std::time::Duration;

use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, BlockTransactionsKind, Filter, Log, TransactionRequest};
use alloy::transports::http::{Client, Http};
use alloy::transports::TransportError;
use chrono::{DateTime, Utc};
use tokenscan_common::TokenscanError;

use crate::config::Config;
use crate::parser::TRANSFER_EVENT_SIGNATURE;

type HttpProvider = RootProvider<Http<Client>, Ethereum>;

/// JSON-RPC client for the chain node. Every call is retried up to
/// `max_retries` times with a fixed delay on transport or timeout errors,
/// then surfaces a terminal `Rpc` error. No partial results.
#[derive(Clone)]
pub struct ChainClient {
    provider: HttpProvider,
    request_timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl ChainClient {
    /// Connect to the node and validate its chain id against
    /// configuration. A mismatch is fatal.
    pub async fn connect(config: &Config) -> Result<Self, TokenscanError> {
        let provider = ProviderBuilder::new().on_http(
            config
                .rpc_url
                .parse()
                .map_err(|e| TokenscanError::Config(format!("invalid RPC URL: {e}")))?,
        );

        let client = Self {
            provider,
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
        };

        let chain_id = client
            .with_retry("eth_chainId", || client.provider.get_chain_id())
            .await?;
        if chain_id != config.chain_id {
            return Err(TokenscanError::Config(format!(
                "chain id mismatch: expected {}, got {}",
                config.chain_id, chain_id
            )));
        }

        tracing::info!(rpc_url = %config.rpc_url, chain_id, "Connected to chain node");
        Ok(client)
    }

    /// Latest block height reported by the node.
    pub async fn latest_block_number(&self) -> Result<u64, TokenscanError> {
        self.with_retry("eth_blockNumber", || self.provider.get_block_number())
            .await
    }

    /// Timestamp of a block.
    pub async fn block_timestamp(&self, number: u64) -> Result<DateTime<Utc>, TokenscanError> {
        let block = self
            .with_retry("eth_getBlockByNumber", || {
                self.provider.get_block_by_number(
                    BlockNumberOrTag::Number(number),
                    BlockTransactionsKind::Hashes,
                )
            })
            .await?
            .ok_or_else(|| TokenscanError::Rpc(format!("block {number} not found")))?;

        DateTime::from_timestamp(block.header.timestamp as i64, 0)
            .ok_or_else(|| TokenscanError::Rpc(format!("block {number} has invalid timestamp")))
    }

    /// Transfer logs for the given address set over `[from, to]`. The call
    /// is atomic: either the complete range is returned or it fails.
    pub async fn get_transfer_logs(
        &self,
        from: u64,
        to: u64,
        addresses: Vec<Address>,
    ) -> Result<Vec<Log>, TokenscanError> {
        let filter = Filter::new()
            .from_block(from)
            .to_block(to)
            .address(addresses)
            .event_signature(TRANSFER_EVENT_SIGNATURE);

        self.with_retry("eth_getLogs", || self.provider.get_logs(&filter))
            .await
    }

    /// Read-only contract call.
    pub async fn call(&self, to: Address, input: &[u8]) -> Result<Bytes, TokenscanError> {
        let tx = TransactionRequest::default()
            .to(to)
            .input(Bytes::copy_from_slice(input).into());

        self.with_retry("eth_call", || async { self.provider.call(&tx).await })
            .await
    }

    async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, TokenscanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut last_error = String::new();

        for attempt in 0..=self.max_retries {
            match tokio::time::timeout(self.request_timeout, call()).await {
                Ok(Ok(value)) => {
                    if attempt > 0 {
                        tracing::info!(op, attempt, "RPC call succeeded after retries");
                    }
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    last_error = e.to_string();
                    tracing::warn!(
                        op,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        error = %last_error,
                        "RPC call failed, retrying",
                    );
                }
                Err(_) => {
                    last_error = format!("timed out after {:?}", self.request_timeout);
                    tracing::warn!(
                        op,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        "RPC call timed out, retrying",
                    );
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(TokenscanError::Rpc(format!(
            "{op} failed after {} retries: {last_error}",
            self.max_retries
        )))
    }
}
