//! Middleware: request metadata, the `next` continuation, and the engine
//! that composes a stack of middleware functions into a single pre-built
//! dispatch chain.

use crate::error::RpcErrorCode;
use crate::{Context, RpcError, RpcResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Request info passed to middleware.
#[derive(Clone, Debug)]
pub struct Request {
    pub path: String,
    pub procedure_type: ProcedureType,
    pub input: serde_json::Value,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcedureType {
    Query,
    Mutation,
}

/// A procedure's resolved output: the JSON-encoded data plus the success
/// code the resolver selected for the envelope (`RPC_OK` unless the
/// resolver opted into [`crate::error::Created`]), per spec §4.1's
/// `ok(data, code)` contract.
#[derive(Clone, Debug)]
pub struct Response {
    pub data: serde_json::Value,
    pub code: RpcErrorCode,
}

impl Response {
    /// A response with the default `RPC_OK` success code.
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            data,
            code: RpcErrorCode::Ok,
        }
    }

    pub fn with_code(data: serde_json::Value, code: RpcErrorCode) -> Self {
        Self { data, code }
    }
}

/// Plain data defaults to `RPC_OK` — most middleware and resolvers never
/// need to think about the success code at all.
impl From<serde_json::Value> for Response {
    fn from(data: serde_json::Value) -> Self {
        Response::ok(data)
    }
}

/// The continuation a middleware calls to run the rest of the chain
/// (subsequent middleware, then ultimately the resolver).
pub type Next<Ctx> = Arc<
    dyn Fn(Context<Ctx>, Request) -> Pin<Box<dyn Future<Output = RpcResult<Response>> + Send>>
        + Send
        + Sync,
>;

/// A single middleware stage.
pub type MiddlewareFn<Ctx> = Arc<
    dyn Fn(Context<Ctx>, Request, Next<Ctx>) -> Pin<Box<dyn Future<Output = RpcResult<Response>> + Send>>
        + Send
        + Sync,
>;

/// Middleware trait for implementations that need to hold state beyond a
/// plain closure.
pub trait Middleware<Ctx: Clone + Send + Sync + 'static>: Send + Sync {
    fn call(
        &self,
        ctx: Context<Ctx>,
        req: Request,
        next: Next<Ctx>,
    ) -> Pin<Box<dyn Future<Output = RpcResult<Response>> + Send>>;
}

/// Create a middleware stage from a function.
pub fn from_fn<Ctx, F, Fut>(f: F) -> MiddlewareFn<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
    F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RpcResult<Response>> + Send + 'static,
{
    Arc::new(move |ctx, req, next| Box::pin(f(ctx, req, next)))
}

/// Wrap a `Next` so that calling it a second time returns a
/// `RPC_MIDDLEWARE_ERROR` instead of re-running the rest of the chain.
///
/// The composition order relies on each stage calling `next` at most once
/// *per activation* of that stage; a stage that calls it twice (or never,
/// while still expecting a response) is a programmer error in user
/// middleware, not something the engine should silently tolerate.
///
/// Must be called fresh for every request, not once at `compose()` time:
/// the guard's `AtomicBool` tracks a single activation, and a pre-composed
/// chain is reused across every request that flows through it. Sharing one
/// `guard_next` instance across requests would flip the flag permanently
/// on the first real call and spuriously fail every call after it.
fn guard_next<Ctx>(inner: Next<Ctx>) -> Next<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    let called = Arc::new(AtomicBool::new(false));
    Arc::new(move |ctx, req| {
        let inner = inner.clone();
        let called = called.clone();
        Box::pin(async move {
            if called.swap(true, Ordering::SeqCst) {
                return Err(RpcError::middleware("next() called multiple times"));
            }
            inner(ctx, req).await
        })
    })
}

/// Compose a stack of middleware (in declaration order) with a terminal
/// continuation (typically the resolver invocation) into a single `Next`.
///
/// Declaration order runs outbound (first middleware registered runs
/// first); the terminal runs last; unwinding runs in the reverse order, as
/// each stage's code after `await next(...)` resumes.
///
/// `compose` itself runs once, at procedure/router build time (§9 "the
/// chain is built once per procedure"), but the `Next` it returns is
/// invoked once per request thereafter. Each layer therefore builds its
/// `guard_next` wrapper *inside* the closure that runs per request, so a
/// fresh "have I been called yet" flag exists for every activation rather
/// than one shared across the chain's whole lifetime.
pub fn compose<Ctx>(stack: &[MiddlewareFn<Ctx>], terminal: Next<Ctx>) -> Next<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    stack.iter().rev().fold(terminal, |next, mw| {
        let mw = mw.clone();
        Arc::new(move |ctx, req| {
            let guarded_next = guard_next(next.clone());
            mw(ctx, req, guarded_next)
        })
    })
}
