//! Audited execution endpoints

use super::agents::parse_agent_id;
use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use agentpod_foundation::{Error, Resource};
use agentpod_task::{ExecutionId, ExecutionRecord, NewExecution};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SkipLimit {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

fn parse_execution_id(id: &str) -> Result<ExecutionId, Error> {
    id.parse().map_err(|_| Error::not_found(Resource::Execution, id))
}

pub async fn list_executions(
    State(state): State<ApiState>,
    Query(query): Query<SkipLimit>,
) -> ApiResult<Json<Value>> {
    let records = state.executions.list(query.skip, query.limit);
    Ok(Json(json!({ "count": records.len(), "data": records })))
}

pub async fn list_agent_executions(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
    Query(query): Query<SkipLimit>,
) -> ApiResult<Json<Value>> {
    let id = parse_agent_id(&agent_id)?;
    // unknown agents are a 404, not an empty list
    state.executions.registry().get_agent(&id)?;

    let records = state.executions.list_for_agent(&id, query.skip, query.limit);
    Ok(Json(json!({ "count": records.len(), "data": records })))
}

pub async fn start_execution(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
    Json(request): Json<NewExecution>,
) -> ApiResult<Json<ExecutionRecord>> {
    let id = parse_agent_id(&agent_id)?;
    let record = state
        .executions
        .start(&id, request)
        .map_err(ApiError::for_execution)?;
    Ok(Json(record))
}

pub async fn get_execution(
    State(state): State<ApiState>,
    Path(execution_id): Path<String>,
) -> ApiResult<Json<ExecutionRecord>> {
    let id = parse_execution_id(&execution_id)?;
    Ok(Json(state.executions.get(&id)?))
}

pub async fn cancel_execution(
    State(state): State<ApiState>,
    Path(execution_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_execution_id(&execution_id)?;
    state.executions.cancel(&id).map_err(ApiError::for_execution)?;
    Ok(Json(json!({ "message": "Execution cancelled successfully" })))
}

pub async fn delete_execution(
    State(state): State<ApiState>,
    Path(execution_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_execution_id(&execution_id)?;
    state.executions.delete(&id).map_err(ApiError::for_execution)?;
    Ok(Json(json!({ "message": "Execution deleted successfully" })))
}
