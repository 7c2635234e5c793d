//! Remote tier over a Synap-compatible key-value server
//!
//! Every operation is a StreamableHTTP command:
//! ```json
//! {
//!   "command": "kv.get",
//!   "request_id": "uuid",
//!   "payload": { "key": "user:1" }
//! }
//! ```
//! Values are encoded with the tier's [`Codec`] and sent base64-encoded.

use crate::codec::{Codec, CodecKind};
use crate::error::{CacheError, Result};
use crate::tier::CacheTier;
use crate::types::{CacheValue, Expiration, validate_key};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Remote tier configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the server
    pub base_url: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Retries for connect/timeout failures
    pub max_retries: u32,
    /// Optional bearer token
    pub auth_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:15500".to_string(),
            timeout_ms: 30_000,
            max_retries: 3,
            auth_token: None,
        }
    }
}

impl RemoteConfig {
    /// Create a new configuration with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the timeout for requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the authentication token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the maximum retry attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Remote cache tier
#[derive(Clone)]
pub struct RemoteTier<C: Codec = CodecKind> {
    config: Arc<RemoteConfig>,
    http_client: Client,
    base_url: Url,
    codec: C,
}

impl RemoteTier<CodecKind> {
    /// Create a remote tier with the default codec
    pub fn new(config: RemoteConfig) -> Result<Self> {
        Self::with_codec(config, CodecKind::default())
    }
}

impl<C: Codec> RemoteTier<C> {
    /// Create a remote tier with an explicit codec
    pub fn with_codec(config: RemoteConfig, codec: C) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;

        let mut http_client_builder = Client::builder().timeout(config.timeout());

        if let Some(ref token) = config.auth_token {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| CacheError::Config(format!("invalid auth token: {}", e)))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
            http_client_builder = http_client_builder.default_headers(headers);
        }

        let http_client = http_client_builder.build()?;

        info!(
            "Remote tier targeting {} (codec={}, timeout={}ms)",
            base_url,
            codec.name(),
            config.timeout_ms
        );

        Ok(Self {
            config: Arc::new(config),
            http_client,
            base_url,
            codec,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Codec used for values
    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Send a StreamableHTTP command and return its payload.
    ///
    /// Connect and timeout failures are retried with exponential backoff;
    /// anything the server answers is returned as-is.
    async fn send_command(&self, command: &str, payload: Value) -> Result<Value> {
        let url = self.base_url.join("api/v1/command")?;
        let mut attempt = 0u32;

        loop {
            let body = json!({
                "command": command,
                "request_id": uuid::Uuid::new_v4().to_string(),
                "payload": payload,
            });

            match self.http_client.post(url.clone()).json(&body).send().await {
                Ok(response) => return Self::read_payload(response).await,
                Err(e) if is_retryable(&e) && attempt < self.config.max_retries => {
                    let backoff = backoff_delay(attempt);
                    warn!(
                        "{} failed ({}), retrying in {:?} (attempt {}/{})",
                        command,
                        e,
                        backoff,
                        attempt + 1,
                        self.config.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn read_payload(response: reqwest::Response) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CacheError::ServerError(format!("{}: {}", status, error_text)));
        }

        let result: Value = response.json().await?;

        if !result["success"].as_bool().unwrap_or(false) {
            let error_msg = result["error"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string();
            return Err(CacheError::ServerError(error_msg));
        }

        Ok(result["payload"].clone())
    }
}

/// Longest wait between two retries
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// 50ms doubling per attempt, capped at [`MAX_BACKOFF`]
fn backoff_delay(attempt: u32) -> Duration {
    let millis = 50u64.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(millis).min(MAX_BACKOFF)
}

fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// TTL in whole seconds, rounded up so sub-second hints still expire.
/// Saturates at `u64::MAX`.
pub(crate) fn ttl_secs(expiration: &Expiration) -> Option<u64> {
    expiration.ttl().map(|ttl| {
        u64::try_from(ttl.as_millis().div_ceil(1000))
            .unwrap_or(u64::MAX)
            .max(1)
    })
}

/// Extract the base64 text of a stored value from a `kv.get` payload.
///
/// Accepts `null`, a bare string, a JSON-quoted string (the server returns
/// stored JSON text) and `{found, value}` objects.
fn stored_text(key: &str, payload: Value) -> Result<Option<String>> {
    match payload {
        Value::Null => Ok(None),
        Value::String(text) => {
            Ok(Some(serde_json::from_str::<String>(&text).unwrap_or(text)))
        }
        Value::Object(mut object) => {
            if !object.get("found").and_then(Value::as_bool).unwrap_or(true) {
                return Ok(None);
            }
            match object.remove("value") {
                Some(value) => stored_text(key, value),
                None => Err(CacheError::InvalidResponse(format!(
                    "missing value for key '{}'",
                    key
                ))),
            }
        }
        other => Err(CacheError::InvalidResponse(format!(
            "unexpected payload for key '{}': {}",
            key, other
        ))),
    }
}

#[async_trait]
impl<C: Codec> CacheTier for RemoteTier<C> {
    fn name(&self) -> &'static str {
        "synap"
    }

    async fn get<T: CacheValue>(&self, key: &str) -> Result<Option<T>> {
        validate_key(key)?;
        debug!("Remote GET key={}", key);

        let payload = json!({"key": key});
        let response = self.send_command("kv.get", payload).await?;

        let Some(text) = stored_text(key, response)? else {
            debug!("Remote MISS key={}", key);
            return Ok(None);
        };

        let bytes = STANDARD
            .decode(text.as_bytes())
            .map_err(|e| CacheError::Deserialization(format!("invalid base64: {}", e)))?;

        Ok(Some(self.codec.decode(&bytes)?))
    }

    async fn set<T: CacheValue>(
        &self,
        key: &str,
        value: &T,
        expiration: Expiration,
    ) -> Result<()> {
        validate_key(key)?;
        expiration.validate()?;

        let bytes = self.codec.encode(value)?;
        let ttl = ttl_secs(&expiration);
        debug!("Remote SET key={}, size={}, ttl={:?}", key, bytes.len(), ttl);

        let payload = json!({
            "key": key,
            "value": STANDARD.encode(&bytes),
            "ttl": ttl,
        });

        self.send_command("kv.set", payload).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        debug!("Remote DELETE key={}", key);

        let payload = json!({"key": key});
        self.send_command("kv.del", payload).await?;
        Ok(())
    }
}
