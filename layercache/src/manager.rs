//! Application-facing cache facade

use crate::backend::{CacheBackend, FarTier};
use crate::config::CacheConfig;
use crate::error::Result;
use crate::memory::MemoryTier;
use crate::multi_layer::TieredCache;
use crate::redis_tier::{RedisConfig, RedisTier};
use crate::remote::{RemoteConfig, RemoteTier};
use crate::tier::CacheTier;
use crate::types::{CacheValue, Expiration, MemoryConfig};

/// Entry point for application code.
///
/// Forwards every call to the configured provider unchanged, so callers do
/// not depend on which tiers were chosen at startup.
///
/// ```no_run
/// use layercache::{CacheManager, Expiration, MemoryConfig, RemoteConfig};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> layercache::Result<()> {
/// let cache = CacheManager::multi_layer(
///     MemoryConfig::default(),
///     RemoteConfig::new("http://localhost:15500"),
/// )?;
///
/// cache
///     .set("user:1", &"John Doe".to_string(), Expiration::absolute(Duration::from_secs(300)))
///     .await?;
/// let name: Option<String> = cache.get("user:1").await?;
/// cache.remove("user:1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CacheManager<P = CacheBackend> {
    provider: P,
}

impl<P: CacheTier> CacheManager<P> {
    /// Wrap an already-built provider
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The provider calls are forwarded to
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Store a value
    pub async fn set<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        expiration: Expiration,
    ) -> Result<()> {
        self.provider.set(key, value, expiration).await
    }

    /// Retrieve a value; `None` when the key is not cached
    pub async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        self.provider.get(key).await
    }

    /// Remove a value; absent keys are not an error
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.provider.remove(key).await
    }
}

impl CacheManager<CacheBackend> {
    /// Build from configuration
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        Ok(Self::new(CacheBackend::from_config(config).await?))
    }

    /// In-process cache only.
    ///
    /// The expiration sweep starts when called inside a tokio runtime.
    pub fn memory(config: MemoryConfig) -> Self {
        Self::new(CacheBackend::Memory(swept_memory_tier(config)))
    }

    /// Synap server only
    pub fn synap(config: RemoteConfig) -> Result<Self> {
        Ok(Self::new(CacheBackend::Distributed(FarTier::Synap(
            RemoteTier::new(config)?,
        ))))
    }

    /// Redis only
    pub async fn redis(config: &RedisConfig) -> Result<Self> {
        Ok(Self::new(CacheBackend::Distributed(FarTier::Redis(
            RedisTier::connect(config).await?,
        ))))
    }

    /// In-process L1 in front of a Synap server.
    ///
    /// The L1 expiration sweep starts when called inside a tokio runtime.
    pub fn multi_layer(memory: MemoryConfig, remote: RemoteConfig) -> Result<Self> {
        Ok(Self::new(CacheBackend::MultiLayer(TieredCache::new(
            swept_memory_tier(memory),
            FarTier::Synap(RemoteTier::new(remote)?),
        ))))
    }

    /// In-process L1 in front of Redis
    pub async fn multi_layer_redis(memory: MemoryConfig, redis: &RedisConfig) -> Result<Self> {
        let far = FarTier::Redis(RedisTier::connect(redis).await?);
        Ok(Self::new(CacheBackend::MultiLayer(TieredCache::new(
            swept_memory_tier(memory),
            far,
        ))))
    }
}

fn swept_memory_tier(config: MemoryConfig) -> MemoryTier {
    let tier = MemoryTier::new(config);
    tier.start_expiration_sweep();
    tier
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_manager_round_trip() {
        let cache = CacheManager::memory(MemoryConfig::default());

        cache
            .set("session:abc", &"token123".to_string(), Expiration::NONE)
            .await
            .unwrap();
        let value: Option<String> = cache.get("session:abc").await.unwrap();
        assert_eq!(value, Some("token123".to_string()));

        cache.remove("session:abc").await.unwrap();
        let value: Option<String> = cache.get("session:abc").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_manager_forwards_expiration() {
        let cache = CacheManager::new(MemoryTier::default());

        cache
            .set("k", &1u8, Expiration::absolute(Duration::from_millis(30)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get::<u8>("k").await.unwrap(), None);
    }

    fn sweeping_config() -> MemoryConfig {
        MemoryConfig {
            max_entries: None,
            default_ttl_secs: None,
            sweep_interval_ms: 10,
        }
    }

    #[tokio::test]
    async fn test_memory_manager_sweeps_expired_entries() {
        let cache = CacheManager::memory(sweeping_config());

        for i in 0..100 {
            let expiration = Expiration::absolute(Duration::from_millis(20));
            cache.set(&format!("key:{}", i), &i, expiration).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        let memory = cache.provider().memory_tier().unwrap();
        assert!(memory.is_empty());
        assert_eq!(memory.stats().expirations, 100);
    }

    #[tokio::test]
    async fn test_multi_layer_manager_sweeps_near_tier() {
        let cache = CacheManager::multi_layer(
            sweeping_config(),
            RemoteConfig::new("http://localhost:15500"),
        )
        .unwrap();
        let memory = cache.provider().memory_tier().unwrap();

        memory
            .set("k", &1u8, Expiration::absolute(Duration::from_millis(20)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(memory.is_empty());
    }

    #[test]
    fn test_synap_manager_rejects_bad_url() {
        assert!(CacheManager::synap(RemoteConfig::new("::")).is_err());
        assert!(
            CacheManager::multi_layer(MemoryConfig::default(), RemoteConfig::new("::")).is_err()
        );
    }

    #[test]
    fn test_multi_layer_manager_shape() {
        let cache = CacheManager::multi_layer(
            MemoryConfig::default(),
            RemoteConfig::new("http://localhost:15500"),
        )
        .unwrap();
        assert_eq!(cache.provider().name(), "multi_layer");
    }
}
