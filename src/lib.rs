//! # orpc
//!
//! A typed, transport-agnostic RPC request pipeline.
//!
//! ## Overview
//!
//! A procedure is built fluently from an input type (optionally backed by a
//! [`Schema`]), a handler closure, and any per-procedure middleware; procedures
//! are assembled into a [`Router`] tree that can nest namespaces and attach
//! router-level middleware. The router itself does not know about HTTP, or
//! any other transport — [`http::handle_request`] is the one included
//! adapter, translating an already-buffered [`http::RawRequest`] into a
//! router call and encoding the resulting envelope back to bytes.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                     Host transport                        │
//! │        (HTTP listener, IPC bridge, test harness, ...)     │
//! └───────────────────────────┬───────────────────────────────┘
//!                              │  RawRequest
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                      http::handle_request                 │
//! │   prefix/method check → codec decode → size check          │
//! └───────────────────────────┬───────────────────────────────┘
//!                              │  (path, input)
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                         Router                              │
//! │   lazily-built dotted-path index, memoized once             │
//! │   ┌─────────────┐   ┌─────────────┐   ┌─────────────────┐  │
//! │   │ middleware  │──▶│ middleware  │──▶│  ProcedureDef    │  │
//! │   │  (router)   │   │ (procedure) │   │  schema→handler  │  │
//! │   └─────────────┘   └─────────────┘   └─────────────────┘  │
//! └───────────────────────────┬───────────────────────────────┘
//!                              │  Envelope
//!                              ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │                      http::handle_request                  │
//! │        codec encode → default headers → RawResponse         │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use orpc::prelude::*;
//! use std::sync::Arc;
//!
//! #[derive(Clone, Default)]
//! struct AppContext;
//!
//! let users_get = ProcedureBuilder::<AppContext>::new("get")
//!     .input::<()>()
//!     .query(|_ctx, _input: ()| async { Ok(serde_json::json!({"id": 1})) });
//!
//! let router = RouterBuilder::<AppContext>::new()
//!     .middleware(logging_middleware())
//!     .nest("users", RouterBuilder::<AppContext>::new().procedure("get", users_get).build())
//!     .build();
//!
//! let config = RpcConfig::default();
//! let create_context = create_context_fn(|_req| async { AppContext });
//! # async {
//! let response = handle_request(&router, &config, &create_context, request).await;
//! # };
//! ```

mod codec;
mod config;
mod context;
mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod procedure;
pub mod router;
pub mod schema;
pub mod validation;

#[cfg(test)]
mod tests;

pub use codec::{Format, decode_request_body, serialize_response};
pub use config::RpcConfig;
pub use context::{AppContext, Context, EmptyContext};
pub use error::{
    Created, Envelope, EnvelopeError, IntoRpcOutput, RpcError, RpcErrorCode, RpcResult, err, ok,
    to_error,
};
pub use http::{
    CreateContext, RawRequest, RawResponse, create_context_fn, handle_request,
    validate_input_size, validate_path,
};
pub use logging::{RequestId, logging_middleware, should_log_slow_request};
pub use middleware::{Middleware, MiddlewareFn, Next, ProcedureType, Request, Response, compose, from_fn};
pub use procedure::{ProcedureBuilder, ProcedureDef, ValidationMode};
pub use router::{DynRouter, Router, RouterBuilder};
pub use schema::{BoxedSchema, Issue, PathSegment, Schema, ValidateAdapter, parse_input, parse_output};
pub use validation::{Validate, ValidationRules};

/// Import everything you need with a single `use orpc::prelude::*;`.
pub mod prelude {
    pub use crate::{
        AppContext, BoxedSchema, Context, Created, CreateContext, DynRouter, EmptyContext,
        Envelope, EnvelopeError, Format, IntoRpcOutput, Issue, Middleware, MiddlewareFn, Next,
        PathSegment, ProcedureBuilder, ProcedureDef, ProcedureType, RawRequest, RawResponse,
        Request, Response, Router, RequestId, RouterBuilder, RpcConfig, RpcError, RpcErrorCode,
        RpcResult, Schema, ValidateAdapter, Validate, ValidationMode, ValidationRules, compose,
        create_context_fn, decode_request_body, err, from_fn, handle_request, logging_middleware,
        ok, parse_input, parse_output, serialize_response, should_log_slow_request, to_error,
        validate_input_size, validate_path,
    };
}
