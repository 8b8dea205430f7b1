use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;
use chrono::Utc;
use tokenscan_common::store::TokenStore;
use tokenscan_common::Token;

use crate::client::ChainClient;
use crate::parser::{decode_decimals, decode_string_or_bytes32};

// ERC-20 function selectors (first 4 bytes of the keccak256 hash).
const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03]; // name()
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41]; // symbol()
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67]; // decimals()

const FALLBACK_NAME: &str = "Unknown";
const FALLBACK_SYMBOL: &str = "UNK";
const FALLBACK_DECIMALS: u8 = 18;

#[derive(Debug, Clone)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Fetches ERC-20 token metadata via `eth_call`, falling back to
/// `("Unknown", "UNK", 18)` on any decode failure.
pub struct MetadataProvider {
    client: Arc<ChainClient>,
}

impl MetadataProvider {
    pub fn new(client: Arc<ChainClient>) -> Self {
        Self { client }
    }

    pub async fn fetch(&self, token_address: &str) -> TokenMetadata {
        let address = match Address::from_str(token_address) {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(token = token_address, error = %e, "Invalid token address for metadata fetch");
                return TokenMetadata {
                    name: FALLBACK_NAME.to_string(),
                    symbol: FALLBACK_SYMBOL.to_string(),
                    decimals: FALLBACK_DECIMALS,
                };
            }
        };

        let name = match self.fetch_string(address, &NAME_SELECTOR).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(token = token_address, error = %e, "Failed to fetch token name, using fallback");
                FALLBACK_NAME.to_string()
            }
        };

        let symbol = match self.fetch_string(address, &SYMBOL_SELECTOR).await {
            Ok(symbol) => symbol,
            Err(e) => {
                tracing::warn!(token = token_address, error = %e, "Failed to fetch token symbol, using fallback");
                FALLBACK_SYMBOL.to_string()
            }
        };

        let decimals = match self.fetch_decimals(address).await {
            Ok(decimals) => decimals,
            Err(e) => {
                tracing::warn!(token = token_address, error = %e, "Failed to fetch token decimals, using fallback");
                FALLBACK_DECIMALS
            }
        };

        TokenMetadata { name, symbol, decimals }
    }

    /// Replace placeholder metadata for the given tokens. The token rows
    /// already exist, so the upsert only touches name/symbol/decimals and
    /// leaves the counters alone.
    pub async fn refresh(&self, tokens: Arc<dyn TokenStore>, addresses: &[String]) {
        for address in addresses {
            let address = address.to_lowercase();
            let metadata = self.fetch(&address).await;

            let token = Token {
                address: address.clone(),
                name: metadata.name,
                symbol: metadata.symbol,
                decimals: metadata.decimals as i16,
                total_indexed_transfers: 0,
                first_seen_block: None,
                last_seen_block: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };

            match tokens.upsert(&token).await {
                Ok(()) => tracing::info!(
                    token = %address,
                    symbol = %token.symbol,
                    decimals = token.decimals,
                    "Refreshed token metadata",
                ),
                Err(e) => tracing::warn!(token = %address, error = %e, "Failed to store token metadata"),
            }
        }
    }

    async fn fetch_string(
        &self,
        address: Address,
        selector: &[u8; 4],
    ) -> Result<String, anyhow::Error> {
        let result = self.client.call(address, selector).await?;
        Ok(decode_string_or_bytes32(&result)?)
    }

    async fn fetch_decimals(&self, address: Address) -> Result<u8, anyhow::Error> {
        let result = self.client.call(address, &DECIMALS_SELECTOR).await?;
        Ok(decode_decimals(&result)?)
    }
}
