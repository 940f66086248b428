//! Configuration for the RPC request pipeline.
//!
//! This module provides the [`RpcConfig`] struct for customizing HTTP-adapter
//! behavior. All fields have sensible defaults.
//!
//! # Example
//! ```rust,ignore
//! use orpc::RpcConfig;
//!
//! let config = RpcConfig::new()
//!     .with_max_input_size(512 * 1024)
//!     .with_endpoint_prefix("/api/rpc");
//! ```

use serde::{Deserialize, Serialize};

/// Pipeline configuration.
///
/// * `max_input_size` - Maximum input JSON size in bytes. Requests exceeding
///   this limit are rejected with `RPC_PAYLOAD_TOO_LARGE`. Default: 1MB.
/// * `endpoint_prefix` - URL path prefix the HTTP adapter expects before a
///   procedure path, e.g. `/rpc/users.get`. Default: `/rpc`.
/// * `debug_logging` - Enable verbose debug-level logging via `tracing`.
///   Default: false.
/// * `default_headers` - Headers applied to every response in addition to
///   `Content-Type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub max_input_size: usize,
    pub endpoint_prefix: String,
    pub debug_logging: bool,
    pub default_headers: Vec<(String, String)>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            max_input_size: 1024 * 1024,
            endpoint_prefix: "/rpc".to_string(),
            debug_logging: false,
            default_headers: vec![("X-Powered-By".to_string(), "duck-orpc".to_string())],
        }
    }
}

impl RpcConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    pub fn with_endpoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.endpoint_prefix = prefix.into();
        self
    }

    pub fn with_debug_logging(mut self, enabled: bool) -> Self {
        self.debug_logging = enabled;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Validate the configuration; a zero-sized input limit can never accept
    /// a request.
    pub fn validate(&self) -> Result<(), crate::error::RpcError> {
        if self.max_input_size == 0 {
            return Err(crate::error::RpcError::bad_request(
                "max_input_size must be greater than zero",
            ));
        }
        if self.endpoint_prefix.is_empty() {
            return Err(crate::error::RpcError::bad_request(
                "endpoint_prefix must not be empty",
            ));
        }
        Ok(())
    }
}
