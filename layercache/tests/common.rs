//! Common test utilities

use async_trait::async_trait;
use layercache::{
    CacheError, CacheTier, CacheValue, Expiration, JsonCodec, MemoryConfig, MemoryTier,
    RemoteConfig, RemoteTier, Result,
};
use mockito::{Server, ServerGuard};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Per-operation call counters
#[derive(Default)]
pub struct Calls {
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub removes: AtomicUsize,
}

/// Per-operation fault switches
#[derive(Default)]
struct Faults {
    get: AtomicBool,
    set: AtomicBool,
    remove: AtomicBool,
}

/// Tier fake that counts calls, records expirations and fails on demand.
///
/// Backed by a real [`MemoryTier`]; clones share state.
#[derive(Clone)]
pub struct RecordingTier {
    name: &'static str,
    store: MemoryTier,
    calls: Arc<Calls>,
    faults: Arc<Faults>,
    set_delay: Arc<Mutex<Option<Duration>>>,
    expirations: Arc<Mutex<Vec<Expiration>>>,
}

#[allow(dead_code)] // Used by other test modules
impl RecordingTier {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            store: MemoryTier::new(MemoryConfig {
                max_entries: None,
                default_ttl_secs: None,
                sweep_interval_ms: 0,
            }),
            calls: Arc::new(Calls::default()),
            faults: Arc::new(Faults::default()),
            set_delay: Arc::new(Mutex::new(None)),
            expirations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn gets(&self) -> usize {
        self.calls.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.calls.sets.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.calls.removes.load(Ordering::SeqCst)
    }

    pub fn fail_gets(&self, fail: bool) {
        self.faults.get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sets(&self, fail: bool) {
        self.faults.set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.faults.remove.store(fail, Ordering::SeqCst);
    }

    pub fn delay_sets(&self, delay: Duration) {
        *self.set_delay.lock() = Some(delay);
    }

    /// Expirations passed to `set`, oldest first
    pub fn expirations(&self) -> Vec<Expiration> {
        self.expirations.lock().clone()
    }

    /// Read the backing store without counting a call
    pub async fn peek<T: CacheValue>(&self, key: &str) -> Option<T> {
        self.store.get(key).await.expect("backing store read")
    }

    /// Write the backing store without counting a call
    pub async fn seed<T: CacheValue>(&self, key: &str, value: &T) {
        self.store
            .set(key, value, Expiration::NONE)
            .await
            .expect("backing store write");
    }

    fn injected(&self, operation: &str) -> CacheError {
        CacheError::ServerError(format!("injected {} failure in {}", operation, self.name))
    }
}

#[async_trait]
impl CacheTier for RecordingTier {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        self.calls.gets.fetch_add(1, Ordering::SeqCst);
        if self.faults.get.load(Ordering::SeqCst) {
            return Err(self.injected("get"));
        }
        self.store.get(key).await
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        expiration: Expiration,
    ) -> Result<()> {
        self.calls.sets.fetch_add(1, Ordering::SeqCst);
        self.expirations.lock().push(expiration);

        let delay = *self.set_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.faults.set.load(Ordering::SeqCst) {
            return Err(self.injected("set"));
        }
        self.store.set(key, value, expiration).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.calls.removes.fetch_add(1, Ordering::SeqCst);
        if self.faults.remove.load(Ordering::SeqCst) {
            return Err(self.injected("remove"));
        }
        self.store.remove(key).await
    }
}

/// Route log output through the test harness
#[allow(dead_code)] // Used by other test modules
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Create a mock Synap server for testing
#[allow(dead_code)] // Used by other test modules
pub async fn create_mock_server() -> ServerGuard {
    Server::new_async().await
}

/// Setup a JSON-encoding remote tier pointing to a mock server
#[allow(dead_code)] // Used by other test modules
pub async fn setup_remote_tier() -> (RemoteTier<JsonCodec>, ServerGuard) {
    let server = create_mock_server().await;
    let config = RemoteConfig::new(server.url())
        .with_timeout(Duration::from_secs(5))
        .with_max_retries(0);
    let tier = RemoteTier::with_codec(config, JsonCodec).unwrap();
    (tier, server)
}
