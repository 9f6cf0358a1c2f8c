//! MCP Gateway (C8): the only externally reachable component (spec.md
//! §4.8).
//!
//! A JSON-RPC 2.0 endpoint with a fixed tool surface over `agent_*`,
//! `crew_*` and `run_*` operations, plus a `rag_query` passthrough for the
//! peripheral retrieval service (spec.md §1: "not part of the hard core").
//! Single-request form only; batches are rejected with `-32600`. Every
//! tool call is authorized by a bearer token checked at the transport
//! layer — failure is a 401, never a JSON-RPC error — and logged as one
//! structured event carrying the `request_id` propagated from the
//! transport header (see [`crate::telemetry`]).
//!
//! The gateway owns no state of its own: every tool maps onto a method on
//! [`CrewOrchestrator`], which in turn owns the run store, agent/crew
//! registries and git bridge. Run admission backpressure (spec.md §5,
//! "excess `crew_run` requests are accepted and remain queued") is the
//! orchestrator's `run_max_concurrent` semaphore, not a second cap here.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CageConfig;
use crate::error::CageError;
use crate::model::ids::{AgentId, CrewId, RunId, TaskId};
use crate::model::run::{Agent, AgentRole, Crew, RunStatus, RunStrategy, TaskSpec};
use crate::orchestrator::CrewOrchestrator;
use crate::runstore::RunFilter;

// ---------------------------------------------------------------------------
// JSON-RPC envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

fn ok_response(id: Value, result: Value) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

fn err_response(id: Value, error: RpcError) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(error),
    }
}

fn invalid_request(detail: impl Into<String>) -> RpcError {
    RpcError {
        code: -32600,
        message: detail.into(),
        data: None,
    }
}

fn method_not_found(method: &str) -> RpcError {
    RpcError {
        code: -32601,
        message: format!("unknown method '{method}'"),
        data: None,
    }
}

fn invalid_params(detail: impl std::fmt::Display) -> RpcError {
    RpcError {
        code: -32602,
        message: detail.to_string(),
        data: None,
    }
}

/// At least one acceptance criterion is required (spec.md §4.7, §8).
fn require_acceptance(task: &TaskSpec) -> Result<(), RpcError> {
    if task.acceptance.is_empty() {
        return Err(invalid_params("task.acceptance must contain at least one criterion"));
    }
    Ok(())
}

/// Translate a [`CageError`] into a JSON-RPC error, carrying its `kind`
/// string alongside `message` (spec.md §7).
fn cage_error(err: CageError) -> RpcError {
    RpcError {
        code: err.rpc_code(),
        message: err.to_string(),
        data: Some(serde_json::json!({ "kind": err.kind() })),
    }
}

// ---------------------------------------------------------------------------
// Shared state and router
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<CageConfig>,
    pub orchestrator: Arc<CrewOrchestrator>,
}

/// Build the gateway's router: a single `POST /rpc` endpoint behind bearer
/// auth. `axum::Router::with_state` binds [`GatewayState`] to the handler;
/// the auth middleware runs first and never sees the request body.
#[must_use]
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/rpc", post(handle_rpc))
        .layer(middleware::from_fn_with_state(state.clone(), require_bearer_token))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve the gateway until the process is asked to shut
/// down. Kept in `gateway` rather than `cage-cli` so the binary crate
/// doesn't need `axum` as a direct dependency.
///
/// # Errors
/// Any I/O error hit binding the listener or while serving.
pub async fn serve(state: GatewayState, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "gateway listening");
    axum::serve(listener, router(state)).await
}

/// Bearer-token check, enforced before the request reaches JSON-RPC
/// parsing. Missing or mismatched tokens are a transport-level 401, not a
/// JSON-RPC error (spec.md §4.8).
async fn require_bearer_token(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: Next,
) -> Response {
    let presented = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == state.config.pod_token => next.run(request).await,
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| crate::model::ids::RunId::new().to_string())
}

// ---------------------------------------------------------------------------
// Transport handler
// ---------------------------------------------------------------------------

async fn handle_rpc(State(state): State<GatewayState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    let request_id = request_id_from_headers(&headers);

    let raw: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return Json(err_response(Value::Null, invalid_request(format!("malformed JSON: {e}")))).into_response();
        }
    };

    if raw.is_array() {
        return Json(err_response(
            Value::Null,
            invalid_request("batch requests are not supported"),
        ))
        .into_response();
    }

    let req: RpcRequest = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => {
            return Json(err_response(Value::Null, invalid_request(format!("malformed request: {e}")))).into_response();
        }
    };

    if req.jsonrpc != "2.0" {
        return Json(err_response(req.id, invalid_request("jsonrpc must be \"2.0\""))).into_response();
    }

    let method = req.method.clone();
    let result = dispatch(&state, &method, req.params).await;

    match &result {
        Ok(_) => tracing::info!(request_id = %request_id, method = %method, "rpc call ok"),
        Err(e) => tracing::warn!(request_id = %request_id, method = %method, code = e.code, message = %e.message, "rpc call failed"),
    }

    match result {
        Ok(value) => Json(ok_response(req.id, value)).into_response(),
        Err(e) => Json(err_response(req.id, e)).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Tool dispatch
// ---------------------------------------------------------------------------

fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, RpcError> {
    serde_json::from_value(params).map_err(invalid_params)
}

fn parse_id<T>(s: &str) -> Result<T, RpcError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    s.parse().map_err(invalid_params)
}

async fn dispatch(state: &GatewayState, method: &str, params: Value) -> Result<Value, RpcError> {
    match method {
        "agent_create" => agent_create(state, params),
        "agent_list" => Ok(agent_list(state)),
        "agent_get" => agent_get(state, params),
        "agent_invoke" => agent_invoke(state, params).await,
        "crew_create" => crew_create(state, params),
        "crew_list" => Ok(crew_list(state)),
        "crew_get" => crew_get(state, params),
        "crew_run" => crew_run(state, params),
        "run_list" => run_list(state, params),
        "run_get" => run_get(state, params),
        "run_cancel" => run_cancel(state, params),
        "rag_query" => rag_query(params),
        other => Err(method_not_found(other)),
    }
}

/// Turn a free-form name into a valid [`AgentId`]/[`CrewId`] slug: lowercase,
/// spaces and other separators collapsed to a single hyphen.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !slug.is_empty() {
            slug.push('-');
            last_was_sep = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[derive(Deserialize)]
struct AgentCreateParams {
    name: String,
    role: AgentRole,
    #[serde(default)]
    config: Value,
    /// Not part of spec.md's literal tool signature; lets a caller
    /// re-register an existing agent by id instead of minting a new slug
    /// from `name` every time (registration is an idempotent upsert).
    #[serde(default)]
    agent_id: Option<String>,
}

fn agent_create(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: AgentCreateParams = parse_params(params)?;
    let id_source = p.agent_id.unwrap_or_else(|| slugify(&p.name));
    let id = AgentId::new(&id_source).map_err(invalid_params)?;
    let agent = Agent {
        id,
        name: p.name,
        role: p.role,
        config: p.config,
    };
    state.orchestrator.register_agent(agent.clone());
    Ok(serde_json::to_value(agent).expect("Agent serializes"))
}

fn agent_list(state: &GatewayState) -> Value {
    serde_json::to_value(state.orchestrator.list_agents()).expect("agents serialize")
}

#[derive(Deserialize)]
struct AgentGetParams {
    agent_id: String,
}

fn agent_get(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: AgentGetParams = parse_params(params)?;
    let id: AgentId = parse_id(&p.agent_id)?;
    let agent = state.orchestrator.get_agent(&id).map_err(cage_error)?;
    Ok(serde_json::to_value(agent).expect("Agent serializes"))
}

#[derive(Deserialize)]
struct AgentInvokeParams {
    agent_id: String,
    task: TaskSpec,
    #[serde(default)]
    context: Value,
    #[serde(default)]
    timeout_s: Option<u64>,
}

async fn agent_invoke(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: AgentInvokeParams = parse_params(params)?;
    let id: AgentId = parse_id(&p.agent_id)?;
    require_acceptance(&p.task)?;
    let timeout_s = p.timeout_s.unwrap_or(state.config.run_default_timeout_s);

    let invocation = state.orchestrator.invoke_agent(&id, p.task, p.context);
    let outcome = tokio::time::timeout(std::time::Duration::from_secs(timeout_s.max(1)), invocation).await;

    match outcome {
        Ok(result) => result.map_err(cage_error),
        Err(_elapsed) => Err(cage_error(CageError::Timeout {
            run_id: format!("agent:{id}"),
        })),
    }
}

#[derive(Deserialize)]
struct CrewCreateParams {
    name: String,
    roles: BTreeMap<String, String>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    crew_id: Option<String>,
}

fn crew_create(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: CrewCreateParams = parse_params(params)?;
    let id_source = p.crew_id.unwrap_or_else(|| slugify(&p.name));
    let id = CrewId::new(&id_source).map_err(invalid_params)?;

    let mut roles = BTreeMap::new();
    for (role, agent_id) in p.roles {
        let agent_id: AgentId = parse_id(&agent_id)?;
        roles.insert(role, agent_id);
    }

    let crew = Crew {
        id,
        name: p.name,
        roles,
        labels: p.labels,
    };
    state.orchestrator.register_crew(crew.clone()).map_err(cage_error)?;
    Ok(serde_json::to_value(crew).expect("Crew serializes"))
}

fn crew_list(state: &GatewayState) -> Value {
    serde_json::to_value(state.orchestrator.list_crews()).expect("crews serialize")
}

#[derive(Deserialize)]
struct CrewGetParams {
    crew_id: String,
}

fn crew_get(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: CrewGetParams = parse_params(params)?;
    let id: CrewId = parse_id(&p.crew_id)?;
    let crew = state.orchestrator.get_crew(&id).map_err(cage_error)?;
    Ok(serde_json::to_value(crew).expect("Crew serializes"))
}

#[derive(Deserialize)]
struct CrewRunParams {
    crew_id: String,
    task: TaskSpec,
    task_id: Option<String>,
    #[serde(default)]
    strategy: Option<RunStrategy>,
    #[serde(default)]
    timeout_s: Option<u64>,
}

fn crew_run(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: CrewRunParams = parse_params(params)?;
    let crew_id: CrewId = parse_id(&p.crew_id)?;
    let task_id = match p.task_id {
        Some(id) => id.parse().map_err(invalid_params)?,
        None => TaskId::new(&format!(
            "{}-{}",
            chrono::Utc::now().format("%Y-%m-%d"),
            slugify(&p.task.title)
        ))
        .map_err(invalid_params)?,
    };
    let strategy = p.strategy.unwrap_or_default();
    let timeout_s = p.timeout_s.unwrap_or(state.config.run_default_timeout_s);

    let run_id = state
        .orchestrator
        .run_crew(crew_id, task_id, p.task, strategy, timeout_s)
        .map_err(cage_error)?;

    Ok(serde_json::json!({ "run_id": run_id.to_string(), "status": "queued" }))
}

#[derive(Deserialize, Default)]
struct RunListParams {
    #[serde(default)]
    status: Option<RunStatus>,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    crew_id: Option<String>,
}

fn run_list(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: RunListParams = if params.is_null() {
        RunListParams::default()
    } else {
        parse_params(params)?
    };
    let filter = RunFilter {
        status: p.status,
        task_id: p.task_id.map(|s| s.parse()).transpose().map_err(invalid_params)?,
        crew_id: p.crew_id.map(|s| s.parse()).transpose().map_err(invalid_params)?,
    };
    let runs = state.orchestrator.list_runs(&filter).map_err(cage_error)?;
    Ok(serde_json::to_value(runs).expect("runs serialize"))
}

#[derive(Deserialize)]
struct RunGetParams {
    run_id: String,
}

fn run_get(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: RunGetParams = parse_params(params)?;
    let id: RunId = parse_id(&p.run_id)?;
    let run = state.orchestrator.get_run(id).map_err(cage_error)?;
    Ok(serde_json::to_value(run).expect("Run serializes"))
}

#[derive(Deserialize)]
struct RunCancelParams {
    run_id: String,
}

fn run_cancel(state: &GatewayState, params: Value) -> Result<Value, RpcError> {
    let p: RunCancelParams = parse_params(params)?;
    let id: RunId = parse_id(&p.run_id)?;
    state.orchestrator.cancel_run(id).map_err(cage_error)?;
    Ok(serde_json::json!({ "run_id": id.to_string(), "cancelled": true }))
}

#[derive(Deserialize)]
struct RagQueryParams {
    #[allow(dead_code)]
    query: String,
    #[serde(default)]
    #[allow(dead_code)]
    limit: Option<u32>,
}

/// `rag_query` is explicitly peripheral to the hard core (spec.md §1: "a
/// conventional embedding/search service ... not part of the hard core").
/// This gateway has no embedding index to query against; it validates the
/// call's shape and reports that the capability isn't wired in, rather
/// than silently accepting a query it can't answer.
fn rag_query(params: Value) -> Result<Value, RpcError> {
    let _p: RagQueryParams = parse_params(params)?;
    Err(RpcError {
        code: -32603,
        message: "rag_query is not implemented by this service; it delegates to a separate retrieval service".to_owned(),
        data: Some(serde_json::json!({ "kind": "NotImplemented" })),
    })
}
