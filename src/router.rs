//! The router: an immutable tree of procedures and nested routers, with a
//! flat dotted-path dispatch index built lazily on first lookup and
//! memoized for the life of the router.
//!
//! ```rust,ignore
//! let router = RouterBuilder::<AppContext>::new()
//!     .middleware(logging)
//!     .procedure("health", health_query)
//!     .nest("users", users_router())
//!     .build();
//! ```

use crate::{
    Context, EmptyContext, RpcError, RpcResult,
    middleware::{self, MiddlewareFn, Next, ProcedureType, Request, Response},
    procedure::ProcedureDef,
};
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// A node in the router tree: either a leaf procedure or a nested router.
enum Node<Ctx: Clone + Send + Sync + 'static> {
    Procedure(Arc<ProcedureDef<Ctx>>),
    Router(RouterInner<Ctx>),
}

/// One resolved entry in the flattened dispatch index: the procedure's
/// declared type (for the HTTP adapter's query/mutation mismatch check) and
/// its fully pre-composed call chain (every ancestor router's middleware
/// already folded in, outermost first).
struct IndexEntry<Ctx: Clone + Send + Sync + 'static> {
    procedure_type: ProcedureType,
    call: Next<Ctx>,
}

type RouterIndex<Ctx> = HashMap<String, IndexEntry<Ctx>>;

struct RouterInnerData<Ctx: Clone + Send + Sync + 'static> {
    middleware: Vec<MiddlewareFn<Ctx>>,
    children: HashMap<String, Node<Ctx>>,
    index: OnceLock<RouterIndex<Ctx>>,
}

/// Shared, reference-counted handle to a frozen router's internals. Cloning
/// a `Router`/`RouterInner` is cheap (an `Arc` bump); the index is built at
/// most once regardless of how many clones race to look something up.
struct RouterInner<Ctx: Clone + Send + Sync + 'static>(Arc<RouterInnerData<Ctx>>);

impl<Ctx: Clone + Send + Sync + 'static> Clone for RouterInner<Ctx> {
    fn clone(&self) -> Self {
        RouterInner(self.0.clone())
    }
}

impl<Ctx: Clone + Send + Sync + 'static> RouterInner<Ctx> {
    fn index(&self) -> &RouterIndex<Ctx> {
        self.0.index.get_or_init(|| {
            let mut index = RouterIndex::new();
            collect(self, "", &mut index);
            index
        })
    }
}

/// Depth-first flattening: nested-router entries are inserted first, then
/// this level's own procedures overwrite any colliding key — a procedure
/// registered directly always wins an exact dotted-path collision against a
/// nested router's expansion.
fn collect<Ctx: Clone + Send + Sync + 'static>(
    router: &RouterInner<Ctx>,
    prefix: &str,
    out: &mut RouterIndex<Ctx>,
) {
    let data = &router.0;
    for (name, child) in &data.children {
        let full_path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match child {
            Node::Router(nested) => {
                let mut nested_index = RouterIndex::new();
                collect(nested, &full_path, &mut nested_index);
                for (path, entry) in nested_index {
                    let wrapped = wrap(&data.middleware, entry.call);
                    out.insert(
                        path,
                        IndexEntry {
                            procedure_type: entry.procedure_type,
                            call: wrapped,
                        },
                    );
                }
            }
            Node::Procedure(_) => {}
        }
    }
    // Direct procedures at this level are applied last so they win ties.
    for (name, child) in &data.children {
        if let Node::Procedure(proc_def) = child {
            let full_path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };
            let procedure_type = proc_def.procedure_type.clone();
            let proc_def = proc_def.clone();
            let terminal: Next<Ctx> = Arc::new(move |ctx, req| {
                let proc_def = proc_def.clone();
                Box::pin(async move { proc_def.call(ctx, req.input).await })
            });
            out.insert(
                full_path,
                IndexEntry {
                    procedure_type,
                    call: wrap(&data.middleware, terminal),
                },
            );
        }
    }
}

fn wrap<Ctx: Clone + Send + Sync + 'static>(
    middleware: &[MiddlewareFn<Ctx>],
    terminal: Next<Ctx>,
) -> Next<Ctx> {
    if middleware.is_empty() {
        terminal
    } else {
        middleware::compose(middleware, terminal)
    }
}

/// Mutable builder used to assemble a router before it is frozen by
/// [`RouterBuilder::build`]. There is no mutable handle to a [`Router`]
/// after that point.
pub struct RouterBuilder<Ctx: Clone + Send + Sync + 'static> {
    middleware: Vec<MiddlewareFn<Ctx>>,
    children: HashMap<String, Node<Ctx>>,
    _phantom: PhantomData<fn() -> Ctx>,
}

impl RouterBuilder<EmptyContext> {
    pub fn new_empty() -> Self {
        Self::new()
    }
}

impl<Ctx: Clone + Send + Sync + 'static> RouterBuilder<Ctx> {
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
            children: HashMap::new(),
            _phantom: PhantomData,
        }
    }

    /// Add router-level middleware. Runs outermost relative to any
    /// procedure-level middleware, and outermost relative to nested
    /// routers' middleware when this router nests another via `nest`.
    pub fn middleware<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Response>> + Send + 'static,
    {
        self.middleware.push(middleware::from_fn(f));
        self
    }

    /// Register a fully-built procedure under `name`.
    pub fn procedure(mut self, name: impl Into<String>, proc_def: ProcedureDef<Ctx>) -> Self {
        self.children
            .insert(name.into(), Node::Procedure(Arc::new(proc_def)));
        self
    }

    /// Nest another, already-built router under `namespace`.
    pub fn nest(mut self, namespace: impl Into<String>, other: Router<Ctx>) -> Self {
        self.children
            .insert(namespace.into(), Node::Router(other.0));
        self
    }

    /// Freeze the builder into an immutable, shareable router.
    pub fn build(self) -> Router<Ctx> {
        Router(RouterInner(Arc::new(RouterInnerData {
            middleware: self.middleware,
            children: self.children,
            index: OnceLock::new(),
        })))
    }
}

/// An immutable, cheaply-cloneable router. The dispatch index is built
/// lazily on first `call`/`get_procedure_at_path` and memoized for this
/// router's lifetime.
#[derive(Clone)]
pub struct Router<Ctx: Clone + Send + Sync + 'static = EmptyContext>(RouterInner<Ctx>);

impl<Ctx: Clone + Send + Sync + 'static> Router<Ctx> {
    /// All registered dotted procedure paths, sorted.
    pub fn procedures(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.0.index().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// The declared type (query/mutation) of a procedure at `path`, if any.
    pub fn procedure_type(&self, path: &str) -> Option<ProcedureType> {
        self.0.index().get(path).map(|e| e.procedure_type.clone())
    }

    /// Dispatch a call to the procedure at `path`, against a `ctx` already
    /// produced for this request (typically by a `createContext` callback —
    /// see [`crate::http::handle_request`]).
    pub async fn call(&self, path: &str, input: serde_json::Value, ctx: Ctx) -> RpcResult<Response> {
        let entry = self
            .0
            .index()
            .get(path)
            .ok_or_else(|| RpcError::procedure_not_found(path))?;

        let ctx = Context::new(ctx);
        let req = Request {
            path: path.to_string(),
            procedure_type: entry.procedure_type.clone(),
            input,
        };
        (entry.call)(ctx, req).await
    }
}

/// Type-erased introspection, used where the concrete `Ctx` is not known to
/// the caller. Dispatch itself (`call`) is not part of this trait: producing
/// a `Ctx` per request ties the call to a concrete router, so
/// [`crate::http::handle_request`] is generic over `Ctx` and operates on a
/// concrete `&Router<Ctx>` rather than a `dyn DynRouter`.
pub trait DynRouter: Send + Sync {
    fn procedures(&self) -> Vec<String>;

    fn procedure_type(&self, path: &str) -> Option<ProcedureType>;
}

impl<Ctx: Clone + Send + Sync + 'static> DynRouter for Router<Ctx> {
    fn procedures(&self) -> Vec<String> {
        Router::procedures(self)
    }

    fn procedure_type(&self, path: &str) -> Option<ProcedureType> {
        Router::procedure_type(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::ProcedureBuilder;

    fn health_procedure() -> ProcedureDef<EmptyContext> {
        ProcedureBuilder::<EmptyContext>::new("health")
            .input::<()>()
            .query(|_ctx, _input: ()| async { Ok("ok") })
    }

    #[tokio::test]
    async fn flat_procedure_is_reachable_by_name() {
        let router = RouterBuilder::new_empty()
            .procedure("health", health_procedure())
            .build();
        let out = router
            .call("health", serde_json::json!(null), EmptyContext)
            .await
            .unwrap();
        assert_eq!(out.data, serde_json::json!("ok"));
    }

    #[tokio::test]
    async fn nested_router_is_reachable_by_dotted_path() {
        let get_proc = ProcedureBuilder::<EmptyContext>::new("get")
            .input::<()>()
            .query(|_ctx, _input: ()| async { Ok(42) });
        let users = RouterBuilder::new_empty().procedure("get", get_proc).build();
        let root = RouterBuilder::new_empty().nest("users", users).build();

        assert!(root.procedures().contains(&"users.get".to_string()));
        let out = root
            .call("users.get", serde_json::json!(null), EmptyContext)
            .await
            .unwrap();
        assert_eq!(out.data, serde_json::json!(42));
    }

    #[tokio::test]
    async fn unknown_path_is_procedure_not_found() {
        let router = RouterBuilder::new_empty().build();
        let err = router
            .call("nope", serde_json::json!(null), EmptyContext)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::RpcErrorCode::NotFound);
    }

    #[tokio::test]
    async fn index_is_built_once_and_stable_across_concurrent_readers() {
        let router = RouterBuilder::new_empty()
            .procedure("health", health_procedure())
            .build();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let router = router.clone();
            handles.push(tokio::spawn(async move { router.procedures() }));
        }
        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        for r in &results {
            assert_eq!(r, &vec!["health".to_string()]);
        }
    }

    #[tokio::test]
    async fn router_middleware_wraps_nested_procedures() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let get_proc = ProcedureBuilder::<EmptyContext>::new("get")
            .input::<()>()
            .query(|_ctx, _input: ()| async { Ok(1) });
        let users = RouterBuilder::new_empty().procedure("get", get_proc).build();
        let root = RouterBuilder::new_empty()
            .middleware(move |ctx, req, next| {
                let seen2 = seen2.clone();
                async move {
                    seen2.lock().unwrap().push("root");
                    next(ctx, req).await
                }
            })
            .nest("users", users)
            .build();

        root.call("users.get", serde_json::json!(null), EmptyContext)
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["root"]);
    }
}
