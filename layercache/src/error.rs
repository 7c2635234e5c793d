//! Error types for layercache

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Cache error types
///
/// A miss is never an error: `get` reports it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Empty key
    #[error("Invalid cache key: key must not be empty")]
    InvalidKey,

    /// Zero or otherwise unusable expiration
    #[error("Invalid expiration: {0}")]
    InvalidExpiration(String),

    /// Value stored under `key` is not of the requested type
    #[error("Type mismatch for key '{key}': expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    /// Codec could not encode a value
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Codec could not decode stored bytes
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Redis connection or command error
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Far tier rejected the command
    #[error("Server error: {0}")]
    ServerError(String),

    /// Invalid response from the far tier
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// One or both tiers of a multi-layer write/remove failed.
    /// The tier that succeeded is not rolled back.
    #[error(
        "Multi-layer {operation} incomplete ({})",
        describe_divergence(.near, .far)
    )]
    TierDivergence {
        operation: &'static str,
        near: Option<Box<CacheError>>,
        far: Option<Box<CacheError>>,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CacheError {
    /// True for faults talking to a far tier (network, protocol, server side)
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Http(_)
            | Self::Redis(_)
            | Self::ServerError(_)
            | Self::InvalidResponse(_) => true,
            Self::TierDivergence { near, far, .. } => near
                .iter()
                .chain(far.iter())
                .any(|e| e.is_transport()),
            _ => false,
        }
    }

    /// True when a value could not be encoded or decoded
    pub fn is_encoding(&self) -> bool {
        match self {
            Self::Serialization(_) | Self::Deserialization(_) | Self::TypeMismatch { .. } => true,
            Self::TierDivergence { near, far, .. } => {
                near.iter().chain(far.iter()).any(|e| e.is_encoding())
            }
            _ => false,
        }
    }

    /// True when only one of the two tiers failed
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::TierDivergence { near, far, .. } if near.is_some() != far.is_some()
        )
    }
}

fn describe_divergence(near: &Option<Box<CacheError>>, far: &Option<Box<CacheError>>) -> String {
    let side = |e: &Option<Box<CacheError>>| match e {
        Some(e) => format!("failed: {e}"),
        None => "ok".to_string(),
    };
    format!("near {}; far {}", side(near), side(far))
}
