//! In-process cache tier
//!
//! Values are stored as-is (no encoding) behind `Arc<dyn Any>`, with
//! absolute and sliding expiration and optional LRU capacity.

use crate::error::{CacheError, Result};
use crate::tier::CacheTier;
use crate::types::{CacheValue, Expiration, MemoryConfig, MemoryStats, validate_key};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

type AnyValue = Arc<dyn Any + Send + Sync>;

/// Stored value with expiration metadata
struct MemoryEntry {
    value: AnyValue,
    /// Absolute deadline
    expires_at: Option<Instant>,
    /// Sliding window, measured from `accessed_at`
    sliding: Option<Duration>,
    accessed_at: Instant,
    /// Position in the recency index
    tick: u64,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
            || self
                .sliding
                .is_some_and(|window| now.saturating_duration_since(self.accessed_at) >= window)
    }
}

/// Entries plus an LRU index (oldest tick first)
#[derive(Default)]
struct Slots {
    entries: HashMap<String, MemoryEntry>,
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl Slots {
    fn next_tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn insert(&mut self, key: String, mut entry: MemoryEntry) {
        self.remove(&key);
        entry.tick = self.next_tick();
        self.recency.insert(entry.tick, key.clone());
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<MemoryEntry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }

    /// Mark `key` as most recently used and renew its sliding window
    fn touch(&mut self, key: &str, now: Instant) -> Option<AnyValue> {
        let tick = self.next_tick();
        let entry = self.entries.get_mut(key)?;
        self.recency.remove(&entry.tick);
        entry.tick = tick;
        entry.accessed_at = now;
        self.recency.insert(tick, key.to_string());
        Some(Arc::clone(&entry.value))
    }

    /// Remove every entry expired at `now`, returning how many were dropped
    fn drain_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.recency.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// In-process cache tier
///
/// Cloning is cheap and clones share the same store.
#[derive(Clone)]
pub struct MemoryTier {
    slots: Arc<Mutex<Slots>>,
    stats: Arc<RwLock<MemoryStats>>,
    config: MemoryConfig,
}

impl MemoryTier {
    /// Create a new in-process tier with the given configuration
    pub fn new(config: MemoryConfig) -> Self {
        info!(
            "Initializing memory tier with max_entries={:?}, default_ttl={:?}s",
            config.max_entries, config.default_ttl_secs
        );

        Self {
            slots: Arc::new(Mutex::new(Slots::default())),
            stats: Arc::new(RwLock::new(MemoryStats::default())),
            config,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Start the background sweep of expired entries.
    ///
    /// Returns `None` when `sweep_interval_ms` is 0 or when called outside a
    /// tokio runtime. The task ends on its own once every clone of this tier
    /// has been dropped.
    pub fn start_expiration_sweep(&self) -> Option<tokio::task::JoinHandle<()>> {
        let interval_ms = self.config.sweep_interval_ms;
        if interval_ms == 0 {
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, memory tier sweep not started");
            return None;
        };
        info!("Starting memory tier sweep task (interval={}ms)", interval_ms);

        let slots = Arc::downgrade(&self.slots);
        let stats = Arc::downgrade(&self.stats);
        Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
            // First tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let (Some(slots), Some(stats)) = (slots.upgrade(), stats.upgrade()) else {
                    debug!("Memory tier dropped, stopping sweep task");
                    break;
                };
                purge_expired(&slots, &stats);
            }
        }))
    }

    /// Drop every expired entry now, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        purge_expired(&self.slots, &self.stats)
    }

    /// Check whether a live entry exists without touching its recency
    pub fn contains_key(&self, key: &str) -> bool {
        let slots = self.slots.lock();
        slots
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(Instant::now()))
    }

    /// Number of stored entries, including expired ones not yet swept
    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    /// True when no entries are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        let count = slots.entries.len();
        slots.entries.clear();
        slots.recency.clear();
        debug!("Memory tier CLEAR ({} entries)", count);
    }

    /// Get statistics
    pub fn stats(&self) -> MemoryStats {
        let entries = self.len();
        let mut stats = self.stats.read().clone();
        stats.entries = entries;
        stats
    }

    fn store<T: CacheValue>(&self, key: &str, value: &T, expiration: Expiration) -> Result<()> {
        validate_key(key)?;
        expiration.validate()?;

        let now = Instant::now();
        let absolute = if expiration.is_none() {
            self.config.default_ttl()
        } else {
            expiration.absolute
        };
        let entry = MemoryEntry {
            value: Arc::new(value.clone()),
            // Too far out to represent means never
            expires_at: absolute.and_then(|after| now.checked_add(after)),
            sliding: expiration.sliding,
            accessed_at: now,
            tick: 0,
        };

        let mut slots = self.slots.lock();
        let mut stats = self.stats.write();

        let is_new = !slots.entries.contains_key(key);
        if let Some(max) = self.config.max_entries.filter(|_| is_new) {
            // Expired entries give up their slots before any live one is evicted
            if slots.entries.len() >= max {
                let purged = slots.drain_expired(now);
                if purged > 0 {
                    stats.expirations += purged as u64;
                    debug!("Memory tier reclaimed {} expired slots", purged);
                }
            }

            while slots.entries.len() >= max {
                match slots.evict_lru() {
                    Some(evicted) => {
                        stats.evictions += 1;
                        debug!("Memory tier EVICT: {}", evicted);
                    }
                    None => break,
                }
            }
        }

        slots.insert(key.to_string(), entry);
        stats.sets += 1;
        debug!("Memory tier SET key={}, expiration={:?}", key, expiration);

        Ok(())
    }

    fn load<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;

        let now = Instant::now();
        let value = {
            let mut slots = self.slots.lock();
            let mut stats = self.stats.write();
            stats.gets += 1;

            let expired = match slots.entries.get(key) {
                Some(entry) => entry.is_expired(now),
                None => {
                    stats.misses += 1;
                    debug!("Memory tier MISS key={}", key);
                    return Ok(None);
                }
            };

            if expired {
                slots.remove(key);
                stats.misses += 1;
                stats.expirations += 1;
                debug!("Memory tier EXPIRED key={}", key);
                return Ok(None);
            }

            stats.hits += 1;
            slots.touch(key, now)
        };

        match value {
            Some(value) => match value.downcast_ref::<T>() {
                Some(typed) => {
                    debug!("Memory tier HIT key={}", key);
                    Ok(Some(typed.clone()))
                }
                None => Err(CacheError::TypeMismatch {
                    key: key.to_string(),
                    expected: std::any::type_name::<T>(),
                }),
            },
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;

        let mut slots = self.slots.lock();
        if slots.remove(key).is_some() {
            self.stats.write().removes += 1;
            debug!("Memory tier REMOVE key={}", key);
        }
        Ok(())
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

fn purge_expired(slots: &Mutex<Slots>, stats: &RwLock<MemoryStats>) -> usize {
    let mut slots = slots.lock();
    let count = slots.drain_expired(Instant::now());

    if count > 0 {
        debug!("Cleaning up {} expired keys", count);
        stats.write().expirations += count as u64;
    }
    count
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        self.load(key)
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        expiration: Expiration,
    ) -> Result<()> {
        self.store(key, value, expiration)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.delete(key)
    }
}
