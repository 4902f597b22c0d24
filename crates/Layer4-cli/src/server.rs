//! Server bootstrap

use agentpod_api::{app, ApiState};
use agentpod_foundation::{AuditStorage, PodConfig};
use agentpod_task::{
    AgentRegistry, AutomationEngine, ExecutionCoordinator, RemoteEngine, ScriptedEngine,
    TaskService, TaskServiceConfig,
};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn serve(config: PodConfig) -> anyhow::Result<()> {
    config.ensure_dirs().context("creating storage directories")?;

    let engine: Arc<dyn AutomationEngine> = match &config.engine.endpoint {
        Some(endpoint) => {
            info!("Using remote automation engine at {}", endpoint);
            Arc::new(RemoteEngine::new(endpoint.as_str())?)
        }
        None => {
            warn!("No engine endpoint configured; tasks run on the scripted engine");
            Arc::new(ScriptedEngine::echo())
        }
    };

    let storage = AuditStorage::open(&config.storage.audit_db)
        .with_context(|| format!("opening audit database {}", config.storage.audit_db.display()))?;

    let service_config = TaskServiceConfig::from(&config);
    let tasks = TaskService::new(Arc::clone(&engine), service_config.clone());
    let executions = ExecutionCoordinator::new(
        AgentRegistry::new(),
        engine,
        Arc::new(storage),
        service_config,
    );
    let state = ApiState::new(tasks, executions, config.storage.outputs_dir());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!(
        "AgentPod listening on {} (max {} concurrent tasks)",
        address, config.tasks.max_concurrent
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("AgentPod stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
