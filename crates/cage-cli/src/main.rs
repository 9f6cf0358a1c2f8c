//! `cage` binary: the process entry point wiring configuration, structured
//! logging and the JSON-RPC gateway together. The gateway is the only
//! externally reachable component (spec.md §4.8); this binary owns no
//! behavior of its own beyond starting it.

use std::net::SocketAddr;
use std::sync::Arc;

use cage::bridge::GitBridge;
use cage::config::CageConfig;
use cage::gateway::{self, GatewayState};
use cage::orchestrator::{CrewOrchestrator, NullAgentInvoker};
use cage::runstore::RunStore;
use cage::taskstore::TaskStore;
use cage::telemetry;
use clap::Parser;

/// Start the Cage multi-agent orchestration gateway.
///
/// All service configuration (`REPO_PATH`, `POD_TOKEN`, lock/run timeouts,
/// retry policy) is read from the environment per spec.md §6; the only
/// flag this binary itself recognizes is the bind address.
#[derive(Parser, Debug)]
#[command(name = "cage", version, about)]
struct Args {
    /// Address the JSON-RPC gateway listens on.
    #[arg(long, env = "GATEWAY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _telemetry = telemetry::init();

    let config = Arc::new(CageConfig::from_env()?);

    let run_store = Arc::new(RunStore::open(&config.repo_path)?);
    let task_store = Arc::new(TaskStore::open(&config.repo_path)?);
    let bridge = Arc::new(GitBridge::open(&config.repo_path)?);
    // No real agent backend is wired in yet; NullAgentInvoker lets the
    // gateway and orchestrator run end to end against a deterministic
    // stand-in until a concrete LLM-backed invoker is plugged in.
    let orchestrator = Arc::new(CrewOrchestrator::new(
        run_store,
        task_store,
        bridge,
        Arc::new(NullAgentInvoker),
        config.retry,
        config.run_max_concurrent,
    ));

    let state = GatewayState {
        config: Arc::clone(&config),
        orchestrator,
    };

    gateway::serve(state, args.bind).await?;
    Ok(())
}
