//! The uniform tier interface

use crate::error::Result;
use crate::types::{CacheValue, Expiration};
use async_trait::async_trait;

/// A key-value cache tier.
///
/// Implemented by the in-process tier, the remote tiers, the multi-layer
/// provider and the runtime-configured backend, so any of them can sit
/// behind [`CacheManager`](crate::CacheManager) or on either side of a
/// [`TieredCache`](crate::TieredCache).
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Look up `key`.
    ///
    /// `Ok(None)` is a miss. A stored value equal to `T::default()` is a hit.
    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>>;

    /// Store `value` under `key`, replacing any existing entry and restarting
    /// its expiration.
    async fn set<T: CacheValue>(&self, key: &str, value: &T, expiration: Expiration)
    -> Result<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}
