//! Error taxonomy, response envelope, and the closed `RpcErrorCode` set.
//!
//! Every error that crosses the HTTP boundary is normalized into one of the
//! codes below before it reaches a client. Unknown/foreign errors are
//! classified into `RpcErrorCode::Custom` and always map to HTTP 500.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::Issue;

/// The closed set of RPC error codes.
///
/// Serialized to the wire exactly as the `RPC_*` strings in the taxonomy
/// table (see `as_str`), via a hand-written `Serialize`/`Deserialize` impl
/// below rather than a `rename_all` derive — the wire names carry the `RPC_`
/// prefix the plain `SCREAMING_SNAKE_CASE` of the variant names does not.
/// The `Custom` variant exists so a foreign error can still round-trip
/// through `RpcError` without losing whatever string it arrived with, while
/// still always mapping to `500 Internal Server Error` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RpcErrorCode {
    Ok,
    Created,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Timeout,
    Conflict,
    PreconditionFailed,
    PayloadTooLarge,
    UnsupportedMediaType,
    TooManyRequests,
    ParseError,
    ValidationError,
    ProcedureNotFound,
    ContextError,
    MiddlewareError,
    SerializationError,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    Custom(String),
}

/// Build a `StatusCode` for one of the taxonomy's non-standard wire statuses
/// (460-465). `StatusCode::from_u16` only checks the 100..1000 numeric
/// range, not IANA registration, so these construct fine.
fn custom_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).expect("in-range custom RPC status code")
}

impl RpcErrorCode {
    /// The HTTP status this code maps to, per the exhaustive table in
    /// spec §6. Unknown/custom codes always map to 500.
    pub fn status(&self) -> StatusCode {
        use RpcErrorCode::*;
        match self {
            Ok => StatusCode::OK,
            Created => StatusCode::CREATED,
            BadRequest => StatusCode::BAD_REQUEST,
            Unauthorized => StatusCode::UNAUTHORIZED,
            Forbidden => StatusCode::FORBIDDEN,
            NotFound => StatusCode::NOT_FOUND,
            MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Timeout => StatusCode::REQUEST_TIMEOUT,
            Conflict => StatusCode::CONFLICT,
            PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ParseError => custom_status(460),
            ValidationError => custom_status(461),
            ProcedureNotFound => custom_status(462),
            ContextError => custom_status(463),
            MiddlewareError => custom_status(464),
            SerializationError => custom_status(465),
            InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            NotImplemented => StatusCode::NOT_IMPLEMENTED,
            BadGateway => StatusCode::BAD_GATEWAY,
            ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error() || matches!(self, RpcErrorCode::Custom(_))
    }

    pub fn as_str(&self) -> &str {
        use RpcErrorCode::*;
        match self {
            Ok => "RPC_OK",
            Created => "RPC_CREATED",
            BadRequest => "RPC_BAD_REQUEST",
            Unauthorized => "RPC_UNAUTHORIZED",
            Forbidden => "RPC_FORBIDDEN",
            NotFound => "RPC_NOT_FOUND",
            MethodNotAllowed => "RPC_METHOD_NOT_ALLOWED",
            Timeout => "RPC_TIMEOUT",
            Conflict => "RPC_CONFLICT",
            PreconditionFailed => "RPC_PRECONDITION_FAILED",
            PayloadTooLarge => "RPC_PAYLOAD_TOO_LARGE",
            UnsupportedMediaType => "RPC_UNSUPPORTED_MEDIA_TYPE",
            TooManyRequests => "RPC_TOO_MANY_REQUESTS",
            ParseError => "RPC_PARSE_ERROR",
            ValidationError => "RPC_VALIDATION_ERROR",
            ProcedureNotFound => "RPC_PROCEDURE_NOT_FOUND",
            ContextError => "RPC_CONTEXT_ERROR",
            MiddlewareError => "RPC_MIDDLEWARE_ERROR",
            SerializationError => "RPC_SERIALIZATION_ERROR",
            InternalServerError => "RPC_INTERNAL_SERVER_ERROR",
            NotImplemented => "RPC_NOT_IMPLEMENTED",
            BadGateway => "RPC_BAD_GATEWAY",
            ServiceUnavailable => "RPC_SERVICE_UNAVAILABLE",
            GatewayTimeout => "RPC_GATEWAY_TIMEOUT",
            Custom(s) => s.as_str(),
        }
    }

    /// Parse a wire code string back into a variant, falling back to
    /// `Custom` for anything outside the closed set (including a foreign
    /// service's own `RPC_*`-shaped code we don't recognize).
    fn from_wire_str(s: &str) -> Self {
        use RpcErrorCode::*;
        match s {
            "RPC_OK" => Ok,
            "RPC_CREATED" => Created,
            "RPC_BAD_REQUEST" => BadRequest,
            "RPC_UNAUTHORIZED" => Unauthorized,
            "RPC_FORBIDDEN" => Forbidden,
            "RPC_NOT_FOUND" => NotFound,
            "RPC_METHOD_NOT_ALLOWED" => MethodNotAllowed,
            "RPC_TIMEOUT" => Timeout,
            "RPC_CONFLICT" => Conflict,
            "RPC_PRECONDITION_FAILED" => PreconditionFailed,
            "RPC_PAYLOAD_TOO_LARGE" => PayloadTooLarge,
            "RPC_UNSUPPORTED_MEDIA_TYPE" => UnsupportedMediaType,
            "RPC_TOO_MANY_REQUESTS" => TooManyRequests,
            "RPC_PARSE_ERROR" => ParseError,
            "RPC_VALIDATION_ERROR" => ValidationError,
            "RPC_PROCEDURE_NOT_FOUND" => ProcedureNotFound,
            "RPC_CONTEXT_ERROR" => ContextError,
            "RPC_MIDDLEWARE_ERROR" => MiddlewareError,
            "RPC_SERIALIZATION_ERROR" => SerializationError,
            "RPC_INTERNAL_SERVER_ERROR" => InternalServerError,
            "RPC_NOT_IMPLEMENTED" => NotImplemented,
            "RPC_BAD_GATEWAY" => BadGateway,
            "RPC_SERVICE_UNAVAILABLE" => ServiceUnavailable,
            "RPC_GATEWAY_TIMEOUT" => GatewayTimeout,
            other => Custom(other.to_string()),
        }
    }
}

impl fmt::Display for RpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RpcErrorCode {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RpcErrorCode {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(RpcErrorCode::from_wire_str(&s))
    }
}

/// An RPC error, normalized to a closed code with an optional issue list.
///
/// `details` and `cause` never reach the wire envelope (see `to_error`) —
/// they exist for in-process diagnostics and logging only.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct RpcError {
    pub code: RpcErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub issues: Vec<Issue>,
    #[serde(skip)]
    pub cause: Option<String>,
}

impl RpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            issues: Vec::new(),
            cause: None,
        }
    }

    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::BadRequest, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ValidationError, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::InternalServerError, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::Conflict, message)
    }

    /// An unknown dotted path at lookup time. Per spec §4.6 step 7 and the
    /// boundary-behavior table, a router miss is `RPC_NOT_FOUND` (404), not
    /// `RPC_PROCEDURE_NOT_FOUND` (462) — the latter code exists in the
    /// taxonomy for callers/middleware that want to signal the same idea
    /// with a different wire status, but the router itself never produces it.
    pub fn procedure_not_found(path: &str) -> Self {
        Self::new(
            RpcErrorCode::NotFound,
            format!("Procedure '{path}' not found"),
        )
    }

    pub fn middleware(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::MiddlewareError, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::SerializationError, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::UnsupportedMediaType, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::PayloadTooLarge, message)
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(RpcErrorCode::ParseError, message)
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

/// Implemented by any value a resolver may return. Selects the success
/// code the envelope reports, per spec §4.1's `ok(data, code)` contract —
/// the taxonomy's success codes (`RPC_OK`, `RPC_CREATED`) aren't just a
/// status-mapping detail, a resolver is meant to be able to choose between
/// them.
///
/// The blanket impl below covers ordinary `Serialize` outputs and always
/// selects `RPC_OK`. Wrap a mutation's return value in [`Created`] to
/// report `RPC_CREATED` (201) instead, e.g. a `users.create` handler
/// returning `Ok(Created(new_user))`.
pub trait IntoRpcOutput {
    fn into_rpc_output(self) -> Result<(serde_json::Value, RpcErrorCode), RpcError>;
}

impl<T: Serialize> IntoRpcOutput for T {
    fn into_rpc_output(self) -> Result<(serde_json::Value, RpcErrorCode), RpcError> {
        let value = serde_json::to_value(self)
            .map_err(|e| RpcError::serialization(format!("Failed to serialize output: {e}")))?;
        Ok((value, RpcErrorCode::Ok))
    }
}

/// Wraps a resolver's output to report `RPC_CREATED` instead of the
/// default `RPC_OK`. Deliberately does not implement `Serialize` itself —
/// that keeps it out of the blanket [`IntoRpcOutput`] impl above, so its
/// own impl below is the only one that applies to it.
pub struct Created<T>(pub T);

impl<T: Serialize> IntoRpcOutput for Created<T> {
    fn into_rpc_output(self) -> Result<(serde_json::Value, RpcErrorCode), RpcError> {
        let value = serde_json::to_value(self.0)
            .map_err(|e| RpcError::serialization(format!("Failed to serialize output: {e}")))?;
        Ok((value, RpcErrorCode::Created))
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse_error(format!("JSON error: {err}")).with_cause(err)
    }
}

/// The uniform response envelope returned to every RPC caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    Ok {
        ok: ConstTrue,
        data: serde_json::Value,
        code: RpcErrorCode,
    },
    Err {
        ok: ConstFalse,
        code: RpcErrorCode,
        error: EnvelopeError,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: RpcErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub issues: Vec<Issue>,
}

/// Build a success envelope.
pub fn ok(data: serde_json::Value, code: RpcErrorCode) -> Envelope {
    Envelope::Ok {
        ok: ConstTrue,
        data,
        code,
    }
}

/// Build an error envelope.
pub fn err(error: &RpcError) -> Envelope {
    Envelope::Err {
        ok: ConstFalse,
        code: error.code.clone(),
        error: EnvelopeError {
            code: error.code.clone(),
            message: error.message.clone(),
            issues: error.issues.clone(),
        },
    }
}

/// Classify any thrown/returned error into an envelope + HTTP status.
///
/// Foreign errors (anything that isn't already an `RpcError`) are mapped to
/// `RpcErrorCode::InternalServerError`. `RpcError` values pass through with
/// their code, message, and issues preserved exactly — this is never
/// re-classified, per the middleware error-propagation design decision.
pub fn to_error(error: &RpcError) -> (Envelope, StatusCode) {
    (err(error), error.status())
}

/// Marker type that serializes as the JSON literal `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstTrue;
impl Serialize for ConstTrue {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(true)
    }
}
impl<'de> Deserialize<'de> for ConstTrue {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let b = bool::deserialize(d)?;
        if b {
            Ok(ConstTrue)
        } else {
            Err(serde::de::Error::custom("expected `true`"))
        }
    }
}

/// Marker type that serializes as the JSON literal `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstFalse;
impl Serialize for ConstFalse {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(false)
    }
}
impl<'de> Deserialize<'de> for ConstFalse {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let b = bool::deserialize(d)?;
        if !b {
            Ok(ConstFalse)
        } else {
            Err(serde::de::Error::custom("expected `false`"))
        }
    }
}

/// Result type alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
