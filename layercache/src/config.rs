use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::codec::CodecKind;
use crate::error::{CacheError, Result};
use crate::multi_layer::PromotionMode;
use crate::redis_tier::RedisConfig;
use crate::remote::RemoteConfig;
use crate::types::MemoryConfig;

/// Main cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub mode: CacheMode,
    pub memory: MemoryConfig,
    pub far: FarConfig,
    pub promotion: PromotionMode,
    pub logging: LoggingConfig,
}

/// Which tiers take part
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// In-process tier only
    #[default]
    Memory,
    /// Shared far tier only
    Distributed,
    /// In-process L1 in front of the far tier
    MultiLayer,
}

/// Shared store implementation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FarBackend {
    #[default]
    Synap,
    Redis,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FarConfig {
    pub backend: FarBackend,
    pub codec: CodecKind,
    pub synap: RemoteConfig,
    pub redis: RedisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: CacheConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.memory.max_entries == Some(0) {
            return Err(CacheError::Config(
                "memory.max_entries must be at least 1".to_string(),
            ));
        }
        if self.memory.default_ttl_secs == Some(0) {
            return Err(CacheError::Config(
                "memory.default_ttl_secs must be positive".to_string(),
            ));
        }

        if self.mode != CacheMode::Memory {
            match self.far.backend {
                FarBackend::Synap => {
                    url::Url::parse(&self.far.synap.base_url)?;
                    if self.far.synap.timeout_ms == 0 {
                        return Err(CacheError::Config(
                            "far.synap.timeout_ms must be positive".to_string(),
                        ));
                    }
                }
                FarBackend::Redis => {
                    if self.far.redis.url.is_empty() {
                        return Err(CacheError::Config("far.redis.url is required".to_string()));
                    }
                }
            }
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => Ok(()),
            other => Err(CacheError::Config(format!(
                "logging.format must be json, pretty or compact (got '{}')",
                other
            ))),
        }
    }
}
