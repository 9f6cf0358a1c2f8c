//! Black-box MCP Gateway (C8) scenario: a client registers an agent and
//! a crew, starts a run, and polls it to completion, entirely through
//! the JSON-RPC surface (spec.md §4.8). Exercises the transport layer
//! (bearer auth, envelope validation) together with the tool dispatch
//! table, unlike `gateway::tests`, which checks individual handlers.

#![cfg(feature = "gateway")]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use cage::bridge::GitBridge;
use cage::config::{CageConfig, RetryPolicy};
use cage::gateway::{router, GatewayState};
use cage::orchestrator::{CrewOrchestrator, NullAgentInvoker};
use cage::runstore::RunStore;
use cage::taskstore::TaskStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn gateway() -> (GatewayState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    std::process::Command::new("git").arg("init").arg("-q").arg(dir.path()).status().unwrap();
    let run_store = Arc::new(RunStore::open(dir.path()).unwrap());
    let bridge = Arc::new(GitBridge::open(dir.path()).unwrap());
    let task_store = Arc::new(TaskStore::open(dir.path()).unwrap());
    let config = Arc::new(CageConfig {
        repo_path: dir.path().to_path_buf(),
        pod_token: "test-pod-token".to_owned(),
        lock_default_ttl_s: 300,
        run_max_concurrent: 4,
        run_default_timeout_s: 30,
        retry: RetryPolicy { max_attempts: 3, base_ms: 1, cap_ms: 10 },
    });
    let orchestrator = Arc::new(CrewOrchestrator::new(
        run_store,
        task_store,
        bridge,
        Arc::new(NullAgentInvoker),
        config.retry,
        config.run_max_concurrent,
    ));
    (GatewayState { config, orchestrator }, dir)
}

async fn call(state: &GatewayState, method: &str, params: Value) -> Value {
    let app = router(state.clone());
    let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params }).to_string();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc")
                .header("content-type", "application/json")
                .header("authorization", "Bearer test-pod-token")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn register_run_and_poll_a_crew_end_to_end() {
    let (state, _dir) = gateway();

    let created = call(
        &state,
        "agent_create",
        json!({ "name": "Solo Planner", "role": "planner", "config": {} }),
    )
    .await;
    let agent_id = created["result"]["id"].as_str().unwrap().to_owned();
    assert_eq!(agent_id, "solo-planner");

    let crew = call(
        &state,
        "crew_create",
        json!({ "name": "Solo Crew", "roles": { "planner": agent_id } }),
    )
    .await;
    let crew_id = crew["result"]["id"].as_str().unwrap().to_owned();

    let run = call(
        &state,
        "crew_run",
        json!({
            "crew_id": crew_id,
            "task": { "title": "Write the README", "description": "draft it", "acceptance": ["drafted"] },
            "strategy": "plan_only",
        }),
    )
    .await;
    let run_id = run["result"]["run_id"].as_str().unwrap().to_owned();
    assert_eq!(run["result"]["status"], "queued");

    let mut final_status = None;
    for _ in 0..50 {
        let polled = call(&state, "run_get", json!({ "run_id": run_id })).await;
        let status = polled["result"]["status"].as_str().unwrap().to_owned();
        if status == "succeeded" || status == "failed" || status == "cancelled" {
            final_status = Some(status);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(final_status.as_deref(), Some("succeeded"));

    let listed = call(&state, "run_list", json!({ "crew_id": crew_id })).await;
    let runs = listed["result"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
}

#[tokio::test]
async fn malformed_json_is_invalid_request() {
    let (state, _dir) = gateway();
    let app = router(state);
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/rpc")
                .header("content-type", "application/json")
                .header("authorization", "Bearer test-pod-token")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let rpc: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(rpc["error"]["code"], -32600);
}

#[tokio::test]
async fn invalid_params_on_agent_create_is_rejected() {
    let (state, _dir) = gateway();
    let response = call(&state, "agent_create", json!({ "role": "planner" })).await;
    assert_eq!(response["error"]["code"], -32602);
}
