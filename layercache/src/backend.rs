//! Backend chosen at startup from configuration
//!
//! ```text
//! CacheBackend
//!   ├── Memory(MemoryTier)                              <- single process
//!   ├── Distributed(FarTier)                            <- shared store only
//!   └── MultiLayer(TieredCache<MemoryTier, FarTier>)    <- L1 + L2
//!
//! FarTier
//!   ├── Synap(RemoteTier)
//!   └── Redis(RedisTier)
//! ```
//!
//! [`CacheTier`] has generic methods, so runtime choice goes through enum
//! dispatch rather than trait objects.

use crate::codec::CodecKind;
use crate::config::{CacheConfig, CacheMode, FarBackend, FarConfig};
use crate::error::Result;
use crate::memory::MemoryTier;
use crate::multi_layer::TieredCache;
use crate::redis_tier::RedisTier;
use crate::remote::RemoteTier;
use crate::tier::CacheTier;
use crate::types::{CacheValue, Expiration};
use async_trait::async_trait;
use tracing::info;

/// Shared far tier chosen by configuration
#[derive(Clone)]
pub enum FarTier {
    Synap(RemoteTier<CodecKind>),
    Redis(RedisTier<CodecKind>),
}

impl FarTier {
    /// Build the far tier described by `config`
    pub async fn from_config(config: &FarConfig) -> Result<Self> {
        match config.backend {
            FarBackend::Synap => Ok(Self::Synap(RemoteTier::with_codec(
                config.synap.clone(),
                config.codec,
            )?)),
            FarBackend::Redis => Ok(Self::Redis(
                RedisTier::connect_with_codec(&config.redis, config.codec).await?,
            )),
        }
    }
}

#[async_trait]
impl CacheTier for FarTier {
    fn name(&self) -> &'static str {
        match self {
            Self::Synap(tier) => tier.name(),
            Self::Redis(tier) => tier.name(),
        }
    }

    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Self::Synap(tier) => tier.get(key).await,
            Self::Redis(tier) => tier.get(key).await,
        }
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        expiration: Expiration,
    ) -> Result<()> {
        match self {
            Self::Synap(tier) => tier.set(key, value, expiration).await,
            Self::Redis(tier) => tier.set(key, value, expiration).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match self {
            Self::Synap(tier) => tier.remove(key).await,
            Self::Redis(tier) => tier.remove(key).await,
        }
    }
}

/// Cache backend chosen by configuration
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: in-process tier only
    Memory(MemoryTier),
    /// Shared store only
    Distributed(FarTier),
    /// In-process L1 in front of a shared L2
    MultiLayer(TieredCache<MemoryTier, FarTier>),
}

impl CacheBackend {
    /// Build the backend described by `config`.
    ///
    /// Starts the in-process sweep task when the mode has a memory tier.
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        info!("Building {:?} cache backend", config.mode);

        let backend = match config.mode {
            CacheMode::Memory => Self::Memory(MemoryTier::new(config.memory.clone())),
            CacheMode::Distributed => Self::Distributed(FarTier::from_config(&config.far).await?),
            CacheMode::MultiLayer => Self::MultiLayer(
                TieredCache::new(
                    MemoryTier::new(config.memory.clone()),
                    FarTier::from_config(&config.far).await?,
                )
                .with_promotion(config.promotion),
            ),
        };

        if let Some(memory) = backend.memory_tier() {
            memory.start_expiration_sweep();
        }

        Ok(backend)
    }

    /// In-process tier, when the backend has one
    pub fn memory_tier(&self) -> Option<&MemoryTier> {
        match self {
            Self::Memory(tier) => Some(tier),
            Self::Distributed(_) => None,
            Self::MultiLayer(tiers) => Some(tiers.near()),
        }
    }
}

#[async_trait]
impl CacheTier for CacheBackend {
    fn name(&self) -> &'static str {
        match self {
            Self::Memory(tier) => tier.name(),
            Self::Distributed(tier) => tier.name(),
            Self::MultiLayer(tier) => tier.name(),
        }
    }

    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Self::Memory(tier) => tier.get(key).await,
            Self::Distributed(tier) => tier.get(key).await,
            Self::MultiLayer(tier) => tier.get(key).await,
        }
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        expiration: Expiration,
    ) -> Result<()> {
        match self {
            Self::Memory(tier) => tier.set(key, value, expiration).await,
            Self::Distributed(tier) => tier.set(key, value, expiration).await,
            Self::MultiLayer(tier) => tier.set(key, value, expiration).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match self {
            Self::Memory(tier) => tier.remove(key).await,
            Self::Distributed(tier) => tier.remove(key).await,
            Self::MultiLayer(tier) => tier.remove(key).await,
        }
    }
}
