//! Wire codec: JSON (via `serde_json`) and CBOR (via `ciborium`), negotiated
//! per request by the HTTP adapter.
//!
//! `ciborium` has no record-mode/shape-learning encoder, so unlike a CBOR
//! library that can memoize a map's key layout across calls, this codec
//! re-encodes the full key set on every call. This is a deliberate,
//! documented trade-off (a modest size cost on repeated shapes), not an
//! oversight.

use crate::error::RpcError;
use serde_json::Value;

/// The two wire formats a request/response body may be encoded as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Cbor,
}

impl Format {
    pub fn content_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Cbor => "application/cbor",
        }
    }

    /// Resolve a format from a `Content-Type` or `Accept` header value.
    /// Defaults to JSON when the header is absent or unrecognized.
    pub fn from_content_type(value: Option<&str>) -> Format {
        match value {
            Some(v) if v.contains("cbor") => Format::Cbor,
            _ => Format::Json,
        }
    }
}

/// Decode a request body of the given format into a JSON `Value` (the
/// pipeline's canonical in-process representation regardless of wire
/// format).
pub fn decode_request_body(format: Format, body: &[u8]) -> Result<Value, RpcError> {
    match format {
        Format::Json => {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_slice(body)
                .map_err(|e| RpcError::parse_error(format!("invalid JSON body: {e}")))
        }
        Format::Cbor => {
            if body.is_empty() {
                return Ok(Value::Null);
            }
            ciborium::de::from_reader(body)
                .map_err(|e| RpcError::parse_error(format!("invalid CBOR body: {e}")))
        }
    }
}

/// Serialize a response body (the envelope, already a `Value`) into the
/// negotiated wire format.
pub fn serialize_response(body: &Value, format: Format) -> Result<Vec<u8>, RpcError> {
    match format {
        Format::Json => serde_json::to_vec(body)
            .map_err(|e| RpcError::serialization(format!("failed to encode JSON response: {e}"))),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::ser::into_writer(body, &mut buf).map_err(|e| {
                RpcError::serialization(format!("failed to encode CBOR response: {e}"))
            })?;
            Ok(buf)
        }
    }
}
