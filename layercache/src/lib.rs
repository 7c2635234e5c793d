//! # layercache
//!
//! Key-value caching over two tiers presented as one cache: a fast
//! in-process store (L1) and a shared remote store (L2).
//!
//! ## Features
//!
//! - **Uniform tiers**: in-process, Synap and Redis tiers share one [`CacheTier`] contract
//! - **Promotion on miss**: far-tier hits are copied into the near tier
//! - **Dual writes**: `set`/`remove` reach both tiers; partial failures are reported
//! - **Explicit misses**: `Ok(None)` is never confused with a cached zero value
//! - **Pluggable codecs**: JSON, MessagePack or bincode for far tiers
//! - **Typed per call**: any serde value, chosen at the call site
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layercache::{CacheConfig, CacheManager, Expiration};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::from_file("layercache.yml")?;
//!     let cache = CacheManager::from_config(&config).await?;
//!
//!     cache.set("user:1", &"John Doe".to_string(), Expiration::NONE).await?;
//!     let value: Option<String> = cache.get("user:1").await?;
//!     println!("Value: {:?}", value);
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod manager;
pub mod memory;
pub mod multi_layer;
pub mod redis_tier;
pub mod remote;
pub mod tier;
pub mod types;

pub use backend::{CacheBackend, FarTier};
pub use codec::{BincodeCodec, Codec, CodecKind, JsonCodec, MessagePackCodec};
pub use config::{CacheConfig, CacheMode, FarBackend, FarConfig, LoggingConfig};
pub use error::{CacheError, Result};
pub use manager::CacheManager;
pub use memory::MemoryTier;
pub use multi_layer::{PromotionMode, TieredCache};
pub use redis_tier::{RedisConfig, RedisTier};
pub use remote::{RemoteConfig, RemoteTier};
pub use tier::CacheTier;
pub use types::{CacheValue, Expiration, MemoryConfig, MemoryStats};
