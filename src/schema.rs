//! The validator adapter seam: anything that can parse a JSON value into a
//! typed value (or reject it with a structured issue list) can back an
//! `input`/`output` schema on a procedure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{RpcError, RpcErrorCode};

/// A single path element of an `Issue`: either a struct/object field name or
/// an array index, matching the wire shape `(string|integer)[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Field(s.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

/// A single validation failure, normalized to a message plus a structured path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    #[serde(default)]
    pub path: Vec<PathSegment>,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
        }
    }

    pub fn at(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.push(segment.into());
        self
    }
}

/// Adapter from a concrete validation library (or a hand-rolled one) to the
/// procedure pipeline. `parse` takes an already-deserialized JSON value and
/// either returns the typed value or a list of issues.
///
/// Declared `async` because some validators legitimately need to suspend
/// (e.g. a uniqueness check against a store) — see spec's concurrency notes
/// on schema parsing.
#[async_trait]
pub trait Schema: Send + Sync {
    type Output: Send;

    async fn parse(&self, raw: Value) -> Result<Self::Output, Vec<Issue>>;
}

pub type BoxedSchema<T> = Arc<dyn Schema<Output = T>>;

/// Parse an input payload against a schema, mapping failure to
/// `RPC_BAD_REQUEST` with the issues attached, per spec §4.2.
pub async fn parse_input<T: Send>(
    schema: &dyn Schema<Output = T>,
    raw: Value,
) -> Result<T, RpcError> {
    schema.parse(raw).await.map_err(|issues| {
        RpcError::new(RpcErrorCode::BadRequest, "Validation failed").with_issues(issues)
    })
}

/// Parse a resolver's output against a schema, mapping failure to
/// `RPC_INTERNAL_SERVER_ERROR` — an output validation failure is a server
/// bug, never the caller's fault, per spec §4.2.
pub async fn parse_output<T: Send>(
    schema: &dyn Schema<Output = T>,
    raw: Value,
) -> Result<T, RpcError> {
    schema.parse(raw).await.map_err(|issues| {
        RpcError::new(RpcErrorCode::InternalServerError, "Output validation failed")
            .with_issues(issues)
    })
}

/// Bridges the lightweight [`crate::validation::Validate`] trait into a
/// [`Schema`] so `serde`-deserializable types with field rules can be used
/// as procedure input/output schemas without a third-party validator crate.
pub struct ValidateAdapter<T> {
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T> Default for ValidateAdapter<T> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> ValidateAdapter<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<T> Schema for ValidateAdapter<T>
where
    T: for<'de> Deserialize<'de> + crate::validation::Validate + Send + Sync,
{
    type Output = T;

    async fn parse(&self, raw: Value) -> Result<T, Vec<Issue>> {
        let value: T = serde_json::from_value(raw).map_err(|e| {
            vec![Issue::new(format!("failed to deserialize: {e}"))]
        })?;
        value.validate()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Plain {
        n: i64,
    }

    impl crate::validation::Validate for Plain {
        fn validate(&self) -> Result<(), Vec<Issue>> {
            if self.n < 0 {
                Err(vec![Issue::new("must be non-negative").at("n")])
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn adapter_rejects_invalid_values() {
        let schema: ValidateAdapter<Plain> = ValidateAdapter::new();
        let err = schema.parse(serde_json::json!({"n": -1})).await.unwrap_err();
        assert_eq!(err[0].message, "must be non-negative");
    }

    #[tokio::test]
    async fn adapter_accepts_valid_values() {
        let schema: ValidateAdapter<Plain> = ValidateAdapter::new();
        let v = schema.parse(serde_json::json!({"n": 5})).await.unwrap();
        assert_eq!(v.n, 5);
    }

    #[tokio::test]
    async fn parse_input_maps_to_bad_request() {
        let schema: ValidateAdapter<Plain> = ValidateAdapter::new();
        let err = parse_input(&schema, serde_json::json!({"n": -1}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcErrorCode::BadRequest);
        assert_eq!(err.issues.len(), 1);
    }

    #[tokio::test]
    async fn parse_output_maps_to_internal_error() {
        let schema: ValidateAdapter<Plain> = ValidateAdapter::new();
        let err = parse_output(&schema, serde_json::json!({"n": -1}))
            .await
            .unwrap_err();
        assert_eq!(err.code, RpcErrorCode::InternalServerError);
    }
}
