use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokenscan_common::TokenscanError;

/// Best-effort content cache over Redis. Values are JSON; a miss is
/// `Ok(None)`, distinct from a transport error. Callers treat failures as
/// misses and log them; a cache problem never fails a request.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self, TokenscanError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| TokenscanError::Cache(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| TokenscanError::Cache(e.to_string()))?;

        tracing::info!("Connected to Redis");
        Ok(Self { conn })
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TokenscanError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| TokenscanError::Cache(e.to_string()))?;

        match raw {
            Some(raw) => {
                let value = serde_json::from_str(&raw)
                    .map_err(|e| TokenscanError::Cache(format!("bad cached value: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), TokenscanError> {
        let raw = serde_json::to_string(value)
            .map_err(|e| TokenscanError::Cache(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex(key, raw, ttl.as_secs())
            .await
            .map_err(|e| TokenscanError::Cache(e.to_string()))
    }

    pub async fn delete(&self, key: &str) -> Result<(), TokenscanError> {
        let mut conn = self.conn.clone();
        conn.del(key)
            .await
            .map_err(|e| TokenscanError::Cache(e.to_string()))
    }

    pub async fn health(&self) -> Result<(), TokenscanError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| TokenscanError::Cache(e.to_string()))?;
        Ok(())
    }
}
