//! Multi-layer cache provider
//!
//! Composes a near tier (L1, in-process) and a far tier (L2, shared).
//!
//! ## Lookup Order
//!
//! 1. Check near - served immediately on a hit
//! 2. Check far - only after a near miss
//! 3. Far hit is promoted into near with the near tier's default retention
//!
//! ## Write Strategy
//!
//! `set` and `remove` drive both tiers concurrently, near first. Either tier
//! failing fails the call with [`CacheError::TierDivergence`]; the tier that
//! succeeded is left as is. A `set` racing a `get` on the same key may see one
//! tier updated before the other.

use crate::error::{CacheError, Result};
use crate::tier::CacheTier;
use crate::types::{CacheValue, Expiration};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// How a far-tier hit is copied into the near tier
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromotionMode {
    /// Await the near-tier write before returning; errors are logged
    #[default]
    Inline,
    /// Spawn the near-tier write and return immediately
    Background,
}

/// Two-tier cache provider: near (L1) + far (L2)
pub struct TieredCache<N, F> {
    near: Arc<N>,
    far: Arc<F>,
    promotion: PromotionMode,
}

impl<N, F> Clone for TieredCache<N, F> {
    fn clone(&self) -> Self {
        Self {
            near: Arc::clone(&self.near),
            far: Arc::clone(&self.far),
            promotion: self.promotion,
        }
    }
}

impl<N: CacheTier + 'static, F: CacheTier> TieredCache<N, F> {
    /// Compose two tiers with inline promotion
    pub fn new(near: N, far: F) -> Self {
        Self::from_shared(Arc::new(near), Arc::new(far))
    }

    /// Compose tiers that are also used elsewhere
    pub fn from_shared(near: Arc<N>, far: Arc<F>) -> Self {
        Self {
            near,
            far,
            promotion: PromotionMode::default(),
        }
    }

    /// Set the promotion mode
    pub fn with_promotion(mut self, promotion: PromotionMode) -> Self {
        self.promotion = promotion;
        self
    }

    /// Near (L1) tier
    pub fn near(&self) -> &N {
        &self.near
    }

    /// Far (L2) tier
    pub fn far(&self) -> &F {
        &self.far
    }

    /// Promotion mode in use
    pub fn promotion(&self) -> PromotionMode {
        self.promotion
    }

    async fn promote<T: CacheValue>(&self, key: &str, value: &T) {
        if self.promotion == PromotionMode::Background {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let near = Arc::clone(&self.near);
                let key = key.to_string();
                let value = value.clone();
                handle.spawn(async move {
                    promote_into(near.as_ref(), &key, &value).await;
                });
                return;
            }
        }

        promote_into(self.near.as_ref(), key, value).await;
    }
}

/// Best-effort near-tier write; a failure only costs a slower next read
async fn promote_into<N: CacheTier, T: CacheValue>(near: &N, key: &str, value: &T) {
    match near.set(key, value, Expiration::NONE).await {
        Ok(()) => debug!("Promoted key={} into {}", key, near.name()),
        Err(e) => warn!(key = %key, error = %e, "Promotion into {} failed", near.name()),
    }
}

/// Fold the two tier outcomes of a write or remove into one result
fn combine(operation: &'static str, key: &str, near: Result<()>, far: Result<()>) -> Result<()> {
    match (near, far) {
        (Ok(()), Ok(())) => Ok(()),
        (near, far) => {
            let err = CacheError::TierDivergence {
                operation,
                near: near.err().map(Box::new),
                far: far.err().map(Box::new),
            };
            warn!(key = %key, error = %err, "Tiers diverged");
            Err(err)
        }
    }
}

#[async_trait]
impl<N: CacheTier + 'static, F: CacheTier> CacheTier for TieredCache<N, F> {
    fn name(&self) -> &'static str {
        "multi_layer"
    }

    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        if let Some(value) = self.near.get::<T>(key).await? {
            debug!(key = %key, "cache hit (L1)");
            return Ok(Some(value));
        }

        match self.far.get::<T>(key).await? {
            Some(value) => {
                debug!(key = %key, "cache hit (L2)");
                self.promote(key, &value).await;
                Ok(Some(value))
            }
            None => {
                debug!(key = %key, "cache miss");
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
        let (near, far) = tokio::join!(
            self.near.set(key, value, expiration),
            self.far.set(key, value, expiration),
        );
        combine("set", key, near, far)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let (near, far) = tokio::join!(self.near.remove(key), self.far.remove(key));
        combine("remove", key, near, far)
    }
}
