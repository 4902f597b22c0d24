use crate::state::ApiState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// Health check endpoint
pub async fn health_check(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "agentpod",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.tasks.engine_name(),
        "running_tasks": state.tasks.in_flight(),
        "running_executions": state.executions.in_flight(),
    }))
}

pub async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "pong" }))
}
