//! Fluent procedure builder: per-procedure middleware, input/output schemas,
//! and the validation toggle, compiled once into a pre-composed dispatch
//! chain.
//!
//! ```rust,ignore
//! let get_user = ProcedureBuilder::<AppContext>::new("users.get")
//!     .use_middleware(auth_middleware)
//!     .input::<GetUserInput>()
//!     .query(get_user_handler);
//!
//! let create_user = ProcedureBuilder::<AppContext>::new("users.create")
//!     .use_middleware(auth_middleware)
//!     .input_schema(Arc::new(ValidateAdapter::<CreateUserInput>::new()))
//!     .mutation(create_user_handler);
//! ```

use crate::error::IntoRpcOutput;
use crate::middleware::{self, MiddlewareFn, Next, ProcedureType, Request, Response};
use crate::schema::{BoxedSchema, parse_input, parse_output};
use crate::{Context, RpcError, RpcResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

/// Whether input/output schemas attached to a procedure are actually
/// exercised. `Off` disables *both* input and output parsing against their
/// schemas — a procedure with validation off still deserializes its input
/// via plain `serde_json`, it just skips the schema's own parse/validate
/// step entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    On,
    Off,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::On
    }
}

type OutputTransformer = Arc<dyn Fn(serde_json::Value) -> serde_json::Value + Send + Sync>;

/// A fully-built procedure: path, kind, and a pre-composed dispatch chain
/// (middleware stack folded around the resolver) ready to be placed in a
/// router.
pub struct ProcedureDef<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    pub path: String,
    pub procedure_type: ProcedureType,
    call: Next<Ctx>,
}

impl<Ctx> ProcedureDef<Ctx>
where
    Ctx: Clone + Send + Sync + 'static,
{
    /// Invoke this procedure directly, bypassing any router/HTTP lookup.
    /// This is the escape hatch spec.md's design notes allow in place of a
    /// dedicated in-process caller API.
    pub async fn call(&self, ctx: Context<Ctx>, input: serde_json::Value) -> RpcResult<Response> {
        let req = Request {
            path: self.path.clone(),
            procedure_type: self.procedure_type.clone(),
            input,
        };
        (self.call)(ctx, req).await
    }
}

/// Builder for configuring a single procedure.
pub struct ProcedureBuilder<Ctx, Input = ()>
where
    Ctx: Clone + Send + Sync + 'static,
{
    path: String,
    middleware: Vec<MiddlewareFn<Ctx>>,
    input_schema: Option<BoxedSchema<Input>>,
    output_schema: Option<BoxedSchema<serde_json::Value>>,
    output_transformer: Option<OutputTransformer>,
    validation_mode: ValidationMode,
    _phantom: PhantomData<fn() -> Input>,
}

impl<Ctx> ProcedureBuilder<Ctx, ()>
where
    Ctx: Clone + Send + Sync + 'static,
{
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            middleware: Vec::new(),
            input_schema: None,
            output_schema: None,
            output_transformer: None,
            validation_mode: ValidationMode::On,
            _phantom: PhantomData,
        }
    }

    /// Sets the input type for this procedure, deserialized with plain
    /// `serde_json` (no schema attached — malformed JSON still produces
    /// `RPC_BAD_REQUEST`, but no `Schema::parse` runs).
    pub fn input<NewInput>(self) -> ProcedureBuilder<Ctx, NewInput>
    where
        NewInput: DeserializeOwned + Send + 'static,
    {
        ProcedureBuilder {
            path: self.path,
            middleware: self.middleware,
            input_schema: None,
            output_schema: self.output_schema,
            output_transformer: self.output_transformer,
            validation_mode: self.validation_mode,
            _phantom: PhantomData,
        }
    }

    /// Sets the input type and attaches a schema; the schema's `parse` runs
    /// before the handler, subject to `validation(...)`.
    pub fn input_schema<NewInput>(
        self,
        schema: BoxedSchema<NewInput>,
    ) -> ProcedureBuilder<Ctx, NewInput>
    where
        NewInput: DeserializeOwned + Send + 'static,
    {
        ProcedureBuilder {
            path: self.path,
            middleware: self.middleware,
            input_schema: Some(schema),
            output_schema: self.output_schema,
            output_transformer: self.output_transformer,
            validation_mode: self.validation_mode,
            _phantom: PhantomData,
        }
    }
}

impl<Ctx, Input> ProcedureBuilder<Ctx, Input>
where
    Ctx: Clone + Send + Sync + 'static,
    Input: DeserializeOwned + Send + 'static,
{
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Adds middleware to this procedure, executed in registration order
    /// (first registered = outermost).
    pub fn use_middleware<F, Fut>(mut self, middleware: F) -> Self
    where
        F: Fn(Context<Ctx>, Request, Next<Ctx>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult<Response>> + Send + 'static,
    {
        self.middleware.push(Arc::new(move |ctx, req, next| {
            Box::pin(middleware(ctx, req, next))
        }));
        self
    }

    pub fn use_middleware_fn(mut self, middleware: MiddlewareFn<Ctx>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Attaches an output schema; parsed against the handler's serialized
    /// output, subject to `validation(...)`. Failures map to
    /// `RPC_INTERNAL_SERVER_ERROR` (an output validation failure is a server
    /// bug, never the caller's).
    pub fn output_schema(mut self, schema: BoxedSchema<serde_json::Value>) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Applies a plain transformer to the output after any schema step.
    pub fn output<F>(mut self, transformer: F) -> Self
    where
        F: Fn(serde_json::Value) -> serde_json::Value + Send + Sync + 'static,
    {
        self.output_transformer = Some(Arc::new(transformer));
        self
    }

    /// Toggles whether attached input/output schemas are exercised.
    /// `Off` disables both, not just one.
    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn query<H, Fut, Output>(self, handler: H) -> ProcedureDef<Ctx>
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Output: IntoRpcOutput + Send + 'static,
    {
        self.build(ProcedureType::Query, handler)
    }

    pub fn mutation<H, Fut, Output>(self, handler: H) -> ProcedureDef<Ctx>
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Output: IntoRpcOutput + Send + 'static,
    {
        self.build(ProcedureType::Mutation, handler)
    }

    /// Implements spec's five-step terminal-construction algorithm: parse-or-
    /// skip input, invoke the resolver, parse-or-skip output, apply the
    /// transformer, then pre-compose the middleware stack around all of it
    /// exactly once (not per request).
    fn build<H, Fut, Output>(self, procedure_type: ProcedureType, handler: H) -> ProcedureDef<Ctx>
    where
        H: Fn(Context<Ctx>, Input) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = RpcResult<Output>> + Send + 'static,
        Output: IntoRpcOutput + Send + 'static,
    {
        let input_schema = self.input_schema;
        let output_schema = self.output_schema;
        let output_transformer = self.output_transformer;
        let validation_mode = self.validation_mode;

        let resolver: Next<Ctx> = Arc::new(move |ctx, req| {
            let handler = handler.clone();
            let input_schema = input_schema.clone();
            let output_schema = output_schema.clone();
            let output_transformer = output_transformer.clone();

            Box::pin(async move {
                let input: Input = match (&input_schema, validation_mode) {
                    (Some(schema), ValidationMode::On) => {
                        parse_input(schema.as_ref(), req.input).await?
                    }
                    _ => serde_json::from_value(req.input)
                        .map_err(|e| RpcError::bad_request(format!("Invalid input: {e}")))?,
                };

                let output = handler(ctx, input).await?;
                let (mut output_value, success_code) = output.into_rpc_output()?;

                if let (Some(schema), ValidationMode::On) = (&output_schema, validation_mode) {
                    output_value = serde_json::to_value(
                        parse_output(schema.as_ref(), output_value).await?,
                    )
                    .map_err(|e| RpcError::serialization(format!("Failed to serialize output: {e}")))?;
                }

                if let Some(transformer) = output_transformer {
                    output_value = transformer(output_value);
                }

                Ok(Response::with_code(output_value, success_code))
            }) as Pin<Box<dyn Future<Output = RpcResult<Response>> + Send>>
        });

        let call = middleware::compose(&self.middleware, resolver);

        ProcedureDef {
            path: self.path,
            procedure_type,
            call,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::schema::ValidateAdapter;
    use crate::validation::Validate;
    use proptest::prelude::*;
    use serde::Deserialize;
    use std::sync::Arc as StdArc;

    /// For any procedure with multiple middleware, middleware runs in
    /// registration order.
    #[test]
    fn prop_middleware_registration_order() {
        proptest!(|(num_middleware in 1usize..5)| {
            let execution_order = StdArc::new(std::sync::Mutex::new(Vec::new()));
            let mut builder = ProcedureBuilder::<()>::new("test");

            for i in 0..num_middleware {
                let order = execution_order.clone();
                builder = builder.use_middleware(move |ctx, req, next| {
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(i);
                        next(ctx, req).await
                    }
                });
            }

            let procedure = builder
                .input::<()>()
                .query(|_ctx, _input: ()| async { Ok(()) });

            let rt = tokio::runtime::Runtime::new().unwrap();
            let ctx = Context::new(());
            rt.block_on(procedure.call(ctx, serde_json::json!(null))).unwrap();
            prop_assert_eq!(execution_order.lock().unwrap().clone(), (0..num_middleware).collect::<Vec<_>>());
        });
    }

    #[derive(Debug, Deserialize)]
    struct RangeInput {
        value: i32,
    }

    impl Validate for RangeInput {
        fn validate(&self) -> Result<(), Vec<crate::schema::Issue>> {
            if !(0..=100).contains(&self.value) {
                Err(vec![crate::schema::Issue::new("out of range").at("value")])
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn prop_validated_input_rejects_out_of_range() {
        proptest!(|(value in -100i32..-1)| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let procedure = ProcedureBuilder::<()>::new("test")
                .input_schema(StdArc::new(ValidateAdapter::<RangeInput>::new()))
                .query(|_ctx, input: RangeInput| async move { Ok(input.value) });

            let ctx = Context::new(());
            let result = rt.block_on(procedure.call(ctx, serde_json::json!({"value": value})));
            prop_assert!(result.is_err());
            prop_assert_eq!(result.unwrap_err().code, crate::RpcErrorCode::BadRequest);
        });
    }

    #[test]
    fn prop_validated_input_accepts_in_range() {
        proptest!(|(value in 0i32..=100)| {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let procedure = ProcedureBuilder::<()>::new("test")
                .input_schema(StdArc::new(ValidateAdapter::<RangeInput>::new()))
                .query(|_ctx, input: RangeInput| async move { Ok(input.value) });

            let ctx = Context::new(());
            let result = rt.block_on(procedure.call(ctx, serde_json::json!({"value": value})));
            prop_assert!(result.is_ok());
            prop_assert_eq!(result.unwrap().data, serde_json::json!(value));
        });
    }
}
