//! Value codecs for far tiers
//!
//! Far tiers store bytes, so values pass through a [`Codec`] on the way in
//! and out. The near tier never encodes.

use crate::error::{CacheError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Turns values into bytes and back.
///
/// `decode(encode(v))` must equal `v` for every value the cache is used with.
/// Failures are reported, never replaced with a default value.
pub trait Codec: Clone + Send + Sync + 'static {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Encode a value
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value
    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// UTF-8 JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

/// MessagePack with named struct fields
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl Codec for MessagePackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        rmp_serde::from_slice(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }
}

/// Bincode, standard configuration.
///
/// Not self-describing: types that deserialize through `deserialize_any`
/// (such as `serde_json::Value`) fail to decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(value, bincode::config::standard())
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        let (value, read) =
            bincode::serde::decode_from_slice::<T, _>(bytes, bincode::config::standard())
                .map_err(|e| CacheError::Deserialization(e.to_string()))?;
        if read != bytes.len() {
            return Err(CacheError::Deserialization(format!(
                "{} trailing bytes after value",
                bytes.len() - read
            )));
        }
        Ok(value)
    }
}

/// Codec chosen at runtime from configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    Json,
    #[default]
    #[serde(alias = "messagepack")]
    Msgpack,
    Bincode,
}

impl Codec for CodecKind {
    fn name(&self) -> &'static str {
        match self {
            Self::Json => JsonCodec.name(),
            Self::Msgpack => MessagePackCodec.name(),
            Self::Bincode => BincodeCodec.name(),
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json => JsonCodec.encode(value),
            Self::Msgpack => MessagePackCodec.encode(value),
            Self::Bincode => BincodeCodec.encode(value),
        }
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Self::Json => JsonCodec.decode(bytes),
            Self::Msgpack => MessagePackCodec.decode(bytes),
            Self::Bincode => BincodeCodec.decode(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        id: u64,
        name: String,
        tags: Vec<String>,
        score: Option<f64>,
        attrs: BTreeMap<String, i32>,
    }

    fn sample() -> Profile {
        Profile {
            id: 42,
            name: "Ada".to_string(),
            tags: vec!["admin".to_string(), "ops".to_string()],
            score: Some(9.5),
            attrs: BTreeMap::from([("level".to_string(), 3)]),
        }
    }

    fn zeroed() -> Profile {
        Profile {
            id: 0,
            name: String::new(),
            tags: Vec::new(),
            score: None,
            attrs: BTreeMap::new(),
        }
    }

    fn assert_round_trips<C: Codec>(codec: C) {
        for profile in [sample(), zeroed()] {
            let bytes = codec.encode(&profile).unwrap();
            let decoded: Profile = codec.decode(&bytes).unwrap();
            assert_eq!(decoded, profile, "codec {}", codec.name());
        }

        let bytes = codec.encode(&0i64).unwrap();
        assert_eq!(codec.decode::<i64>(&bytes).unwrap(), 0);

        let bytes = codec.encode("").unwrap();
        assert_eq!(codec.decode::<String>(&bytes).unwrap(), "");

        let bytes = codec.encode(&Option::<u8>::None).unwrap();
        assert_eq!(codec.decode::<Option<u8>>(&bytes).unwrap(), None);

        let bytes = codec.encode(&false).unwrap();
        assert!(!codec.decode::<bool>(&bytes).unwrap());
    }

    #[test]
    fn test_json_round_trip() {
        assert_round_trips(JsonCodec);
    }

    #[test]
    fn test_msgpack_round_trip() {
        assert_round_trips(MessagePackCodec);
    }

    #[test]
    fn test_bincode_round_trip() {
        assert_round_trips(BincodeCodec);
    }

    #[test]
    fn test_codec_kind_dispatch() {
        for kind in [CodecKind::Json, CodecKind::Msgpack, CodecKind::Bincode] {
            assert_round_trips(kind);
        }
        assert_eq!(CodecKind::default(), CodecKind::Msgpack);
    }

    #[test]
    fn test_self_describing_codecs_handle_json_values() {
        let value = serde_json::json!({"a": [1, 2, {"b": null}], "c": "d"});
        for kind in [CodecKind::Json, CodecKind::Msgpack] {
            let bytes = kind.encode(&value).unwrap();
            let decoded: serde_json::Value = kind.decode(&bytes).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn test_decode_failure_is_reported() {
        let err = JsonCodec.decode::<Profile>(b"not json").unwrap_err();
        assert!(matches!(err, CacheError::Deserialization(_)));

        let bytes = MessagePackCodec.encode("text").unwrap();
        let err = MessagePackCodec.decode::<u64>(&bytes).unwrap_err();
        assert!(err.is_encoding());
    }

    #[test]
    fn test_bincode_rejects_trailing_bytes() {
        let mut bytes = BincodeCodec.encode(&7u8).unwrap();
        bytes.push(0xff);
        assert!(BincodeCodec.decode::<u8>(&bytes).is_err());
    }

    #[test]
    fn test_encode_failure_is_reported() {
        // JSON object keys must be strings
        let map = BTreeMap::from([(vec![1u8], 1u8)]);
        let err = JsonCodec.encode(&map).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_codec_kind_from_yaml() {
        let kind: CodecKind = serde_yaml::from_str("messagepack").unwrap();
        assert_eq!(kind, CodecKind::Msgpack);
        let kind: CodecKind = serde_yaml::from_str("json").unwrap();
        assert_eq!(kind, CodecKind::Json);
    }
}
