//! Request-lifecycle logging via `tracing`.
//!
//! Scoped down from the teacher's fuller logging subsystem (which also
//! covered redaction, metrics export, and distributed tracing headers): the
//! core pipeline only needs a span per call plus start/finish/error events,
//! the way any `tracing`-instrumented Rust service emits them. Redaction and
//! metrics are judged to be application-level concerns layered on top of
//! the same `tracing` subscriber, not part of the ambient stack the core
//! crate must carry.

use crate::error::RpcError;
use crate::middleware::{MiddlewareFn, Request};
use crate::{Context, RpcResult};
use std::time::Instant;
use tracing::Instrument;

/// Unique identifier for a single call, used for log correlation.
///
/// UUID v7 carries a timestamp component, so request IDs emitted in order
/// sort lexically the same way, which is convenient when grepping logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v7(uuid::Timestamp::now(uuid::NoContext)))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A middleware that wraps every call in a `tracing` span and logs
/// start/finish/error events, matching the teacher's request-lifecycle
/// logging pattern.
pub fn logging_middleware<Ctx>() -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    crate::middleware::from_fn(|ctx: Context<Ctx>, req: Request, next| {
        let request_id = RequestId::new();
        let span = tracing::info_span!(
            "rpc_call",
            %request_id,
            path = %req.path,
            procedure_type = ?req.procedure_type
        );
        async move {
            tracing::debug!("rpc call started");
            let start = Instant::now();
            let result = next(ctx, req).await;
            match &result {
                Ok(_) => {
                    tracing::info!(
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "rpc call finished"
                    );
                }
                Err(e) => log_result_error(e, start),
            }
            result
        }
        .instrument(span)
    })
}

fn log_result_error(err: &RpcError, start: Instant) {
    let elapsed_ms = start.elapsed().as_millis() as u64;
    if err.code.is_server_error() {
        tracing::error!(code = %err.code, message = %err.message, elapsed_ms, "rpc call errored");
    } else {
        tracing::warn!(code = %err.code, message = %err.message, elapsed_ms, "rpc call rejected");
    }
}

/// Used by host adapters that want to emit a slow-request warning outside
/// of the middleware chain (e.g. from the HTTP adapter around the whole
/// request, including body decode time).
pub fn should_log_slow_request(elapsed: std::time::Duration, threshold: std::time::Duration) -> bool {
    elapsed >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EmptyContext;
    use crate::middleware::{ProcedureType, compose};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn logging_middleware_passes_through_success() {
        let mw = logging_middleware::<EmptyContext>();
        let terminal: crate::middleware::Next<EmptyContext> =
            Arc::new(|_ctx, req| Box::pin(async move { Ok(req.input.into()) }));
        let chain = compose(&[mw], terminal);
        let ctx = Context::new(EmptyContext);
        let req = Request {
            path: "test".into(),
            procedure_type: ProcedureType::Query,
            input: serde_json::json!(1),
        };
        let out = chain(ctx, req).await.unwrap();
        assert_eq!(out.data, serde_json::json!(1));
    }

    #[tokio::test]
    async fn logging_middleware_passes_through_errors() {
        let mw = logging_middleware::<EmptyContext>();
        let terminal: crate::middleware::Next<EmptyContext> = Arc::new(|_ctx, _req| {
            Box::pin(async move {
                Err::<crate::middleware::Response, _>(RpcError::not_found("nope"))
            })
        });
        let chain = compose(&[mw], terminal);
        let ctx = Context::new(EmptyContext);
        let req = Request {
            path: "test".into(),
            procedure_type: ProcedureType::Query,
            input: serde_json::json!(null),
        };
        let err: RpcResult<crate::middleware::Response> = chain(ctx, req).await;
        assert_eq!(err.unwrap_err().code, crate::RpcErrorCode::NotFound);
    }

    #[test]
    fn request_ids_are_unique_and_render_as_uuids() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
    }

    #[test]
    fn slow_request_threshold() {
        assert!(should_log_slow_request(
            Duration::from_millis(500),
            Duration::from_millis(200)
        ));
        assert!(!should_log_slow_request(
            Duration::from_millis(50),
            Duration::from_millis(200)
        ));
    }
}
