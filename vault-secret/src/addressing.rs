//! KV engine addressing.
//!
//! KV v1 and KV v2 disagree on two things: v2 routes secret data under a
//! `data/` segment after the mount, and v2 wraps the payload one level deeper
//! (`data.data`, next to `data.metadata`). Everything generation-specific lives
//! here so the reconciler only sees logical paths and plain payloads.

use crate::error::{ConfigError, TransportError};
use crate::secrets::{Metadata, Payload};
use serde_json::Value;

/// KV secrets engine API generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreGeneration {
    /// KV version 1
    V1,
    /// KV version 2 (versioned)
    #[default]
    V2,
}

/// Payload and metadata extracted from a read response.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSecret {
    /// Secret payload
    pub data: Payload,
    /// Version metadata (KV v2 only)
    pub metadata: Option<Metadata>,
}

impl TryFrom<i64> for StoreGeneration {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(ConfigError::InvalidGeneration(other)),
        }
    }
}

impl StoreGeneration {
    /// Numeric version.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Map a logical path to the path requested under `/v1/`.
    ///
    /// For v2 the first path component is taken as the mount and `data` is
    /// inserted after it, unless the path already contains a `/data/` segment.
    /// Leading slashes are dropped so the first component is always the mount.
    #[must_use]
    pub fn request_path(self, logical: &str) -> String {
        let logical = logical.trim_start_matches('/');
        match self {
            Self::V1 => logical.to_string(),
            Self::V2 if logical.contains("/data/") => logical.to_string(),
            Self::V2 => match logical.split_once('/') {
                Some((mount, rest)) => format!("{mount}/data/{rest}"),
                None => format!("{logical}/data"),
            },
        }
    }

    /// Extract payload and metadata from a read response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] when the envelope is missing.
    pub fn unwrap_payload(self, raw: Value) -> Result<StoredSecret, TransportError> {
        let Value::Object(mut root) = raw else {
            return Err(TransportError::decode("response is not a JSON object"));
        };

        let data = take_object(&mut root, "data")?;
        match self {
            Self::V1 => Ok(StoredSecret {
                data,
                metadata: None,
            }),
            Self::V2 => {
                let mut envelope = data;
                let payload = take_object(&mut envelope, "data")
                    .map_err(|_| TransportError::decode("KV v2 response has no data.data object"))?;
                let metadata = match envelope.remove("metadata") {
                    Some(Value::Object(metadata)) => Some(metadata),
                    _ => None,
                };
                Ok(StoredSecret {
                    data: payload,
                    metadata,
                })
            }
        }
    }

    /// Request body for writing `payload`.
    ///
    /// KV v1 stores the request body itself; KV v2 expects it under `data`.
    #[must_use]
    pub fn write_body(self, payload: &Payload) -> Value {
        match self {
            Self::V1 => Value::Object(payload.clone()),
            Self::V2 => serde_json::json!({ "data": payload }),
        }
    }
}

fn take_object(map: &mut serde_json::Map<String, Value>, key: &str) -> Result<Payload, TransportError> {
    match map.remove(key) {
        Some(Value::Object(object)) => Ok(object),
        _ => Err(TransportError::decode(format!(
            "response has no `{key}` object"
        ))),
    }
}
