//! Query services: the in-process interface the HTTP handlers delegate
//! to. Each service lowercases address inputs, consults the cache first,
//! falls through to the stores, and caches the response with a TTL suited
//! to how fast the underlying data moves.

pub mod holders;
pub mod portfolio;
pub mod stats;
pub mod tokens;
pub mod transfers;

pub use holders::HoldersService;
pub use portfolio::PortfolioService;
pub use stats::StatsService;
pub use tokens::TokenService;
pub use transfers::TransferService;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::RedisCache;

pub const TTL_TRANSFERS: Duration = Duration::from_secs(30);
pub const TTL_TOKENS: Duration = Duration::from_secs(30);
pub const TTL_STATS: Duration = Duration::from_secs(60);
pub const TTL_HOLDER_COUNT: Duration = Duration::from_secs(300);
pub const TTL_TOP_HOLDERS: Duration = Duration::from_secs(300);
pub const TTL_HOLDER: Duration = Duration::from_secs(60);
pub const TTL_PORTFOLIO: Duration = Duration::from_secs(120);
pub const TTL_WALLET_SUMMARY: Duration = Duration::from_secs(300);

/// Cache read as a plain option: errors are logged and treated as misses.
pub(crate) async fn cache_get<T: DeserializeOwned>(
    cache: &Option<RedisCache>,
    key: &str,
) -> Option<T> {
    let cache = cache.as_ref()?;
    match cache.get(key).await {
        Ok(Some(value)) => {
            tracing::debug!(key, "Cache hit");
            Some(value)
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Cache read failed");
            None
        }
    }
}

/// Cache write; failures are logged, never propagated.
pub(crate) async fn cache_put<T: Serialize>(
    cache: &Option<RedisCache>,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    if let Some(cache) = cache {
        if let Err(e) = cache.set(key, value, ttl).await {
            tracing::warn!(key, error = %e, "Failed to cache response");
        }
    }
}
