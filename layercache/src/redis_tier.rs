//! Redis cache tier
//!
//! Values are encoded with the tier's [`Codec`] and stored as plain strings.
//! Redis keeps a single TTL per key, applied in milliseconds.

use crate::codec::{Codec, CodecKind};
use crate::error::Result;
use crate::tier::CacheTier;
use crate::types::{CacheValue, Expiration, validate_key};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Redis tier configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379/0`
    pub url: String,
    /// Prepended to every key
    pub key_prefix: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
        }
    }
}

impl RedisConfig {
    /// Create a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: None,
        }
    }

    /// Namespace every key under `prefix`
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Redis cache tier
///
/// The connection manager reconnects on its own; cloning shares it.
#[derive(Clone)]
pub struct RedisTier<C: Codec = CodecKind> {
    connection: ConnectionManager,
    key_prefix: Option<String>,
    codec: C,
}

impl RedisTier<CodecKind> {
    /// Connect with the default codec
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        Self::connect_with_codec(config, CodecKind::default()).await
    }
}

impl<C: Codec> RedisTier<C> {
    /// Connect with an explicit codec
    pub async fn connect_with_codec(config: &RedisConfig, codec: C) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let connection = client.get_connection_manager().await?;

        info!("Redis tier connected (codec={})", codec.name());

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
            codec,
        })
    }

    /// Codec used for values
    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn full_key(&self, key: &str) -> String {
        prefixed_key(self.key_prefix.as_deref(), key)
    }
}

fn prefixed_key(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, key),
        None => key.to_string(),
    }
}

/// Longest TTL Redis accepts without overflowing its millisecond deadline
const MAX_TTL_MILLIS: u64 = (i64::MAX / 2) as u64;

/// TTL in milliseconds, at least 1.
///
/// Deadlines past [`MAX_TTL_MILLIS`] are stored without expiry.
fn ttl_millis(expiration: &Expiration) -> Option<u64> {
    expiration
        .ttl()
        .and_then(|ttl| u64::try_from(ttl.as_millis()).ok())
        .filter(|ms| *ms <= MAX_TTL_MILLIS)
        .map(|ms| ms.max(1))
}

#[async_trait]
impl<C: Codec> CacheTier for RedisTier<C> {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;
        debug!("Redis GET key={}", key);

        let mut conn = self.connection.clone();
        let data: Option<Vec<u8>> = conn.get(self.full_key(key)).await?;

        match data {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => {
                debug!("Redis MISS key={}", key);
                Ok(None)
            }
        }
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        expiration: Expiration,
    ) -> Result<()> {
        validate_key(key)?;
        expiration.validate()?;

        let bytes = self.codec.encode(value)?;
        let ttl = ttl_millis(&expiration);
        debug!("Redis SET key={}, size={}, ttl_ms={:?}", key, bytes.len(), ttl);

        let mut conn = self.connection.clone();
        match ttl {
            Some(ms) => conn.pset_ex::<_, _, ()>(self.full_key(key), bytes, ms).await?,
            None => conn.set::<_, _, ()>(self.full_key(key), bytes).await?,
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        debug!("Redis DELETE key={}", key);

        let mut conn = self.connection.clone();
        conn.del::<_, ()>(self.full_key(key)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ttl_millis_precedence() {
        let exp =
            Expiration::absolute(Duration::from_secs(5)).with_sliding(Duration::from_secs(60));
        assert_eq!(ttl_millis(&exp), Some(5_000));
        assert_eq!(
            ttl_millis(&Expiration::sliding(Duration::from_millis(250))),
            Some(250)
        );
        assert_eq!(ttl_millis(&Expiration::NONE), None);
    }

    #[test]
    fn test_ttl_millis_out_of_range_means_no_expiry() {
        assert_eq!(ttl_millis(&Expiration::absolute(Duration::MAX)), None);
        assert_eq!(
            ttl_millis(&Expiration::sliding(Duration::from_millis(MAX_TTL_MILLIS + 1))),
            None
        );
        assert_eq!(
            ttl_millis(&Expiration::absolute(Duration::from_millis(MAX_TTL_MILLIS))),
            Some(MAX_TTL_MILLIS)
        );
    }

    #[test]
    fn test_prefixed_key() {
        assert_eq!(prefixed_key(Some("app:"), "user:1"), "app:user:1");
        assert_eq!(prefixed_key(None, "user:1"), "user:1");
    }

    #[test]
    fn test_config_defaults() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert!(config.key_prefix.is_none());

        let config = RedisConfig::new("redis://cache:6379/2").with_key_prefix("svc:");
        assert_eq!(config.key_prefix.as_deref(), Some("svc:"));
    }
}
