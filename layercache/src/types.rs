use crate::error::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bound for values passed through the cache.
///
/// Chosen per call, never per cache instance. The near tier keeps values
/// as-is; far tiers encode them through a [`Codec`](crate::Codec).
pub trait CacheValue: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Expiration hints attached to a write
///
/// Both fields are optional and independent. Tiers that support a single TTL
/// use [`Expiration::ttl`], where `absolute` wins over `sliding`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expiration {
    /// Fixed deadline measured from write time
    pub absolute: Option<Duration>,
    /// Deadline renewed on every successful read
    pub sliding: Option<Duration>,
}

impl Expiration {
    /// No expiration hints; the tier applies its own default retention
    pub const NONE: Self = Self {
        absolute: None,
        sliding: None,
    };

    /// Expire `after` the write, regardless of access
    pub fn absolute(after: Duration) -> Self {
        Self {
            absolute: Some(after),
            sliding: None,
        }
    }

    /// Expire after `window` without access
    pub fn sliding(window: Duration) -> Self {
        Self {
            absolute: None,
            sliding: Some(window),
        }
    }

    /// Set the absolute expiration
    pub fn with_absolute(mut self, after: Duration) -> Self {
        self.absolute = Some(after);
        self
    }

    /// Set the sliding expiration
    pub fn with_sliding(mut self, window: Duration) -> Self {
        self.sliding = Some(window);
        self
    }

    /// True when neither hint is set
    pub fn is_none(&self) -> bool {
        self.absolute.is_none() && self.sliding.is_none()
    }

    /// Single TTL for tiers without sliding support
    pub fn ttl(&self) -> Option<Duration> {
        self.absolute.or(self.sliding)
    }

    /// Reject zero durations
    pub fn validate(&self) -> Result<()> {
        if self.absolute.is_some_and(|d| d.is_zero()) {
            return Err(CacheError::InvalidExpiration(
                "absolute expiration must be positive".to_string(),
            ));
        }
        if self.sliding.is_some_and(|d| d.is_zero()) {
            return Err(CacheError::InvalidExpiration(
                "sliding expiration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reject empty keys
pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}

/// Configuration for the in-process tier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Maximum number of entries before LRU eviction (unbounded when unset)
    pub max_entries: Option<usize>,
    /// Retention for writes that carry no expiration, including promotions
    pub default_ttl_secs: Option<u64>,
    /// Expired-entry sweep interval in milliseconds (0 disables the sweep)
    pub sweep_interval_ms: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: Some(10_000),
            default_ttl_secs: None,
            sweep_interval_ms: 1_000,
        }
    }
}

impl MemoryConfig {
    /// Default retention as a duration
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl_secs.map(Duration::from_secs)
    }
}

/// Statistics for the in-process tier
#[derive(Debug, Default, Clone, Serialize)]
pub struct MemoryStats {
    /// Stored entries, including expired ones not yet removed
    pub entries: usize,
    /// Number of GET operations
    pub gets: u64,
    /// Number of SET operations
    pub sets: u64,
    /// Number of REMOVE operations that found a key
    pub removes: u64,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Entries dropped to respect `max_entries`
    pub evictions: u64,
    /// Entries dropped because they expired
    pub expirations: u64,
}

impl MemoryStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
