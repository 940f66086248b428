//! Generic HTTP adapter.
//!
//! The concrete listener is out of scope: a host framework (axum, hyper,
//! actix, a Tauri IPC bridge, ...) is expected to construct one
//! [`RawRequest`] per inbound request — already-buffered body, method,
//! path (optionally carrying its own `?query`), and headers — and hand it to
//! [`handle_request`]. This mirrors the teacher's `plugin.rs`, generalized
//! away from Tauri's `#[tauri::command]` surface to a transport-neutral
//! function.

use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::codec::{self, Format};
use crate::config::RpcConfig;
use crate::error::{self, RpcError};
use crate::middleware::ProcedureType;
use crate::router::Router;

/// The minimal request shape the adapter is written against. `path` may
/// carry its own `?query=string` suffix, same as a raw request target —
/// the adapter splits it off itself rather than requiring the host to parse
/// query parameters ahead of time.
pub struct RawRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// The adapter's response: status, headers (content-type plus the
/// configured defaults), and an already-encoded body.
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Validate a procedure path: non-empty, no leading/trailing/consecutive
/// dots, only alphanumeric/underscore/dot characters. Reused nearly
/// verbatim from the teacher's Tauri-specific input validation, which was
/// already transport-agnostic.
pub fn validate_path(path: &str) -> Result<(), RpcError> {
    if path.is_empty() {
        return Err(RpcError::validation("Procedure path cannot be empty"));
    }
    if path.starts_with('.') || path.ends_with('.') {
        return Err(RpcError::validation(
            "Procedure path cannot start or end with a dot",
        ));
    }
    if path.contains("..") {
        return Err(RpcError::validation(
            "Procedure path cannot contain consecutive dots",
        ));
    }
    for ch in path.chars() {
        if !ch.is_ascii_alphanumeric() && ch != '_' && ch != '.' {
            return Err(RpcError::validation(format!(
                "Procedure path contains invalid character: '{ch}'"
            )));
        }
    }
    Ok(())
}

/// Reject a body larger than the configured limit.
pub fn validate_input_size(input: &Value, config: &RpcConfig) -> Result<(), RpcError> {
    let size = serde_json::to_vec(input).map(|v| v.len()).unwrap_or(0);
    if size > config.max_input_size {
        return Err(RpcError::payload_too_large(format!(
            "Input size {} bytes exceeds maximum {} bytes",
            size, config.max_input_size
        )));
    }
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn header_contains(headers: &HeaderMap, name: &str, needle: &str) -> bool {
    header_str(headers, name)
        .map(|v| v.to_ascii_lowercase().contains(needle))
        .unwrap_or(false)
}

/// Response format negotiation per spec §4.6: `Accept: application/cbor`
/// wins outright; otherwise a CBOR request `Content-Type` is answered in
/// kind; JSON is the safe default.
fn negotiate_response_format(headers: &HeaderMap) -> Format {
    if header_contains(headers, "accept", "application/cbor") {
        Format::Cbor
    } else if header_contains(headers, "content-type", "application/cbor") {
        Format::Cbor
    } else {
        Format::Json
    }
}

fn split_query(path: &str) -> (&str, &str) {
    match path.split_once('?') {
        Some((p, q)) => (p, q),
        None => (path, ""),
    }
}

fn parse_procedure_type(value: &str) -> Result<ProcedureType, RpcError> {
    match value {
        "query" => Ok(ProcedureType::Query),
        "mutation" => Ok(ProcedureType::Mutation),
        other => Err(RpcError::bad_request(format!(
            "'type' must be 'query' or 'mutation', got '{other}'"
        ))),
    }
}

/// Decode a POST body into `(type, input)` per spec §4.6 step 5: the
/// decoded body must be an object carrying a `type` field in
/// `{query, mutation}` and an `input` field. A codec-level decode failure
/// (malformed JSON/CBOR bytes) is re-surfaced as `RPC_BAD_REQUEST` with a
/// message naming the format, per the spec's explicit wire contract —
/// `codec::decode_request_body`'s own `RPC_PARSE_ERROR` is an internal
/// detail of the codec API, not what reaches the wire here.
fn parse_post_envelope(format: Format, body: &[u8]) -> Result<(ProcedureType, Value), RpcError> {
    let format_name = match format {
        Format::Json => "JSON",
        Format::Cbor => "CBOR",
    };
    let decoded = codec::decode_request_body(format, body)
        .map_err(|_| RpcError::bad_request(format!("Invalid {format_name} request body")))?;
    let obj = decoded.as_object().ok_or_else(|| {
        RpcError::bad_request(format!(
            "{format_name} request body must be an object with 'type' and 'input'"
        ))
    })?;
    let type_str = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::bad_request("request body is missing the required 'type' field"))?;
    let procedure_type = parse_procedure_type(type_str)?;
    let input = obj
        .get("input")
        .cloned()
        .ok_or_else(|| RpcError::bad_request("request body is missing the required 'input' field"))?;
    Ok((procedure_type, input))
}

/// Decode a GET request's `(type, input)` per spec §4.6 step 5: `type` comes
/// from the `type` query parameter (default `query`); `input` comes from
/// the `input` parameter (JSON-decoded, falling back to the raw string on
/// parse failure) or, absent that, from the remaining parameters merged
/// into a flat object.
fn parse_get_envelope(query: &str) -> Result<(ProcedureType, Value), RpcError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| RpcError::bad_request(format!("invalid query string: {e}")))?;

    let type_str = pairs
        .iter()
        .find(|(k, _)| k == "type")
        .map(|(_, v)| v.as_str())
        .unwrap_or("query");
    let procedure_type = parse_procedure_type(type_str)?;

    let input = match pairs.iter().find(|(k, _)| k == "input") {
        Some((_, raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        None => {
            let mut map = serde_json::Map::new();
            for (k, v) in &pairs {
                if k != "type" {
                    map.insert(k.clone(), Value::String(v.clone()));
                }
            }
            Value::Object(map)
        }
    };
    Ok((procedure_type, input))
}

/// Derives a per-request `Ctx` from the inbound request — the
/// `createContext({ req }) → ctx` hook, e.g. reading an `Authorization`
/// header into an `authorized: bool` or a decoded user id. Invoked once per
/// call, before the procedure lookup, so the resulting `Ctx` is what every
/// middleware and the resolver itself observe.
pub type CreateContext<Ctx> =
    Arc<dyn Fn(&RawRequest) -> Pin<Box<dyn Future<Output = Ctx> + Send>> + Send + Sync>;

/// Build a [`CreateContext`] from a plain closure/async fn.
pub fn create_context_fn<Ctx, F, Fut>(f: F) -> CreateContext<Ctx>
where
    F: Fn(&RawRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Ctx> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Implements the ten-step request-handling algorithm:
///
/// 1. Check the request path starts with the configured endpoint prefix.
/// 2. Check the method is GET or POST.
/// 3. Invoke `createContext({ req }) → ctx`.
/// 4. Strip the prefix to recover the dotted procedure path and validate it.
/// 5. Decode the request envelope (`type` + `input`): POST from the body in
///    its negotiated codec, GET from query parameters.
/// 6. Reject if the declared `type` isn't `query`/`mutation`.
/// 7. Look up the procedure in the router.
/// 8. Reject if the procedure's declared type disagrees with the request's
///    declared type.
/// 9. Invoke the router, which runs middleware then the resolver.
/// 10. Serialize the envelope in the negotiated response format and attach
///     default headers.
pub async fn handle_request<Ctx>(
    router: &Router<Ctx>,
    config: &RpcConfig,
    create_context: &CreateContext<Ctx>,
    req: RawRequest,
) -> RawResponse
where
    Ctx: Clone + Send + Sync + 'static,
{
    let response_format = negotiate_response_format(&req.headers);
    match dispatch(router, config, create_context, req).await {
        Ok((body, status)) => respond(config, &body, status, response_format),
        Err(err) => {
            let (envelope, status) = error::to_error(&err);
            log_error(&err);
            let body = serde_json::to_value(&envelope).unwrap_or(Value::Null);
            respond(config, &body, status, response_format)
        }
    }
}

async fn dispatch<Ctx>(
    router: &Router<Ctx>,
    config: &RpcConfig,
    create_context: &CreateContext<Ctx>,
    req: RawRequest,
) -> Result<(Value, StatusCode), RpcError>
where
    Ctx: Clone + Send + Sync + 'static,
{
    let (raw_path, query) = split_query(&req.path);

    // Step 1: prefix check.
    let Some(rest) = raw_path.strip_prefix(config.endpoint_prefix.as_str()) else {
        return Err(RpcError::not_found(
            "Path does not match the configured RPC prefix",
        ));
    };
    let procedure_path = rest.trim_start_matches('/');

    // Step 2: method check.
    if req.method != Method::GET && req.method != Method::POST {
        return Err(RpcError::bad_request(format!(
            "Method {} is not supported; use GET or POST",
            req.method
        )));
    }

    // Step 3: derive ctx from the request before anything else runs.
    let ctx = create_context(&req).await;

    // Step 4: path validation.
    validate_path(procedure_path)?;

    // Step 5/6: parse the envelope and validate its declared type.
    let content_format = Format::from_content_type(header_str(&req.headers, "content-type"));
    let (request_type, input) = if req.method == Method::POST {
        parse_post_envelope(content_format, &req.body)?
    } else {
        parse_get_envelope(query)?
    };

    validate_input_size(&input, config)?;

    // Step 7: procedure lookup.
    let declared_type = router
        .procedure_type(procedure_path)
        .ok_or_else(|| RpcError::procedure_not_found(procedure_path))?;

    // Step 8: request/procedure type agreement.
    if declared_type != request_type {
        return Err(RpcError::bad_request(format!(
            "procedure type mismatch: '{procedure_path}' is declared as {declared_type:?} but the request declared {request_type:?}"
        )));
    }

    // Step 9: invoke.
    let response = router.call(procedure_path, input, ctx).await?;
    Ok((
        serde_json::to_value(error::ok(response.data, response.code)).unwrap_or(Value::Null),
        StatusCode::OK,
    ))
}

fn respond(config: &RpcConfig, body: &Value, status: StatusCode, format: Format) -> RawResponse {
    let encoded = codec::serialize_response(body, format).unwrap_or_default();
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        format.content_type().parse().unwrap(),
    );
    for (name, value) in &config.default_headers {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::try_from(name.as_str()),
            http::header::HeaderValue::try_from(value.as_str()),
        ) {
            headers.insert(name, value);
        }
    }
    RawResponse {
        status,
        headers,
        body: encoded,
    }
}

fn log_error(err: &RpcError) {
    if err.code.is_server_error() {
        tracing::error!(code = %err.code, message = %err.message, "rpc call failed");
    } else {
        tracing::warn!(code = %err.code, message = %err.message, "rpc call rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EmptyContext;
    use crate::procedure::ProcedureBuilder;
    use crate::router::RouterBuilder;
    use http::HeaderValue;

    fn router() -> crate::router::Router<EmptyContext> {
        let get_proc = ProcedureBuilder::<EmptyContext>::new("health")
            .input::<()>()
            .query(|_ctx, _input: ()| async { Ok("ok") });
        let create_proc = ProcedureBuilder::<EmptyContext>::new("create")
            .input::<serde_json::Value>()
            .mutation(|_ctx, input: serde_json::Value| async move { Ok(input) });
        RouterBuilder::new_empty()
            .procedure("health", get_proc)
            .procedure("create", create_proc)
            .build()
    }

    fn create_context() -> CreateContext<EmptyContext> {
        create_context_fn(|_req: &RawRequest| async { EmptyContext })
    }

    fn req(method: Method, path: &str, body: Vec<u8>) -> RawRequest {
        RawRequest {
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body,
        }
    }

    #[tokio::test]
    async fn get_query_succeeds() {
        let router = router();
        let config = RpcConfig::default();
        let resp = handle_request(&router, &config, &create_context(), req(Method::GET, "/rpc/health", vec![])).await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_prefix_is_not_found() {
        let router = router();
        let config = RpcConfig::default();
        let resp =
            handle_request(&router, &config, &create_context(), req(Method::GET, "/not-rpc/health", vec![])).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_method_is_bad_request() {
        let router = router();
        let config = RpcConfig::default();
        let resp =
            handle_request(&router, &config, &create_context(), req(Method::DELETE, "/rpc/health", vec![])).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_on_a_mutation_without_type_param_is_a_type_mismatch() {
        let router = router();
        let config = RpcConfig::default();
        // GET defaults `type` to "query"; "create" is a mutation, so this is
        // a declared-type mismatch, not a method-not-allowed.
        let resp = handle_request(&router, &config, &create_context(), req(Method::GET, "/rpc/create", vec![])).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["error"]["code"], "RPC_BAD_REQUEST");
    }

    #[tokio::test]
    async fn get_with_explicit_type_param_reaches_a_mutation() {
        let router = router();
        let config = RpcConfig::default();
        let resp = handle_request(&router, &config, &create_context(), req(Method::GET, "/rpc/create?type=mutation&n=1", vec![]),
        )
        .await;
        assert_eq!(resp.status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["data"]["n"], "1");
    }

    #[tokio::test]
    async fn get_input_param_is_json_decoded() {
        let router = router();
        let config = RpcConfig::default();
        let resp = handle_request(&router, &config, &create_context(), req(
                Method::GET,
                "/rpc/create?type=mutation&input=%7B%22n%22%3A1%7D",
                vec![],
            ),
        )
        .await;
        assert_eq!(resp.status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["data"]["n"], 1);
    }

    #[tokio::test]
    async fn post_with_invalid_json_is_bad_request() {
        let router = router();
        let config = RpcConfig::default();
        let body = b"{not json".to_vec();
        let resp = handle_request(&router, &config, &create_context(), req(Method::POST, "/rpc/create", body)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["error"]["code"], "RPC_BAD_REQUEST");
    }

    #[tokio::test]
    async fn post_missing_type_field_is_bad_request() {
        let router = router();
        let config = RpcConfig::default();
        let body = serde_json::to_vec(&serde_json::json!({"input": {"n": 1}})).unwrap();
        let resp = handle_request(&router, &config, &create_context(), req(Method::POST, "/rpc/create", body)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_type_mismatch_is_bad_request() {
        let router = router();
        let config = RpcConfig::default();
        // "create" is a mutation; declaring "query" is a type mismatch.
        let body =
            serde_json::to_vec(&serde_json::json!({"type": "query", "input": {"n": 1}})).unwrap();
        let resp = handle_request(&router, &config, &create_context(), req(Method::POST, "/rpc/create", body)).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_procedure_is_not_found() {
        let router = router();
        let config = RpcConfig::default();
        let resp = handle_request(&router, &config, &create_context(), req(Method::GET, "/rpc/nope", vec![])).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn post_mutation_round_trips_envelope() {
        let router = router();
        let config = RpcConfig::default();
        let body = serde_json::to_vec(&serde_json::json!({"type": "mutation", "input": {"n": 1}}))
            .unwrap();
        let resp =
            handle_request(&router, &config, &create_context(), req(Method::POST, "/rpc/create", body)).await;
        assert_eq!(resp.status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["data"]["n"], 1);
        assert_eq!(value["code"], "RPC_OK");
    }

    #[tokio::test]
    async fn cbor_content_type_without_accept_negotiates_cbor_response() {
        let router = router();
        let config = RpcConfig::default();
        let mut r = req(
            Method::POST,
            "/rpc/create",
            {
                let mut buf = Vec::new();
                ciborium::ser::into_writer(
                    &serde_json::json!({"type": "mutation", "input": {"n": 1}}),
                    &mut buf,
                )
                .unwrap();
                buf
            },
        );
        r.headers
            .insert("content-type", HeaderValue::from_static("application/cbor"));
        let resp = handle_request(&router, &config, &create_context(), r).await;
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(
            resp.headers.get("content-type").unwrap(),
            "application/cbor"
        );
    }
}
