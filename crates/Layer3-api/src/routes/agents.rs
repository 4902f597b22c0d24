//! Agent and configuration version endpoints

use super::executions::SkipLimit;
use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use agentpod_foundation::{Error, Resource};
use agentpod_task::{Agent, AgentConfigVersion, AgentId, ExecutionRecord, NewAgentConfig, NewExecution};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default)]
    pub task_prompt: String,
    #[serde(flatten)]
    pub config: NewAgentConfig,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAgentRequest {
    pub is_active: Option<bool>,
}

pub(super) fn parse_agent_id(id: &str) -> Result<AgentId, Error> {
    id.parse().map_err(|_| Error::not_found(Resource::Agent, id))
}

pub async fn create_agent(
    State(state): State<ApiState>,
    Json(request): Json<CreateAgentRequest>,
) -> ApiResult<Json<Agent>> {
    if request.name.trim().is_empty() {
        return Err(Error::InvalidInput("agent name must not be empty".to_string()).into());
    }
    let agent = state
        .executions
        .registry()
        .create_agent(request.name, request.task_prompt, request.config);
    Ok(Json(agent))
}

pub async fn list_agents(
    State(state): State<ApiState>,
    Query(query): Query<SkipLimit>,
) -> ApiResult<Json<Value>> {
    let agents = state.executions.registry().list_agents(query.skip, query.limit);
    Ok(Json(json!({ "count": agents.len(), "data": agents })))
}

pub async fn get_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Agent>> {
    let id = parse_agent_id(&agent_id)?;
    Ok(Json(state.executions.registry().get_agent(&id)?))
}

pub async fn update_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
    Json(request): Json<UpdateAgentRequest>,
) -> ApiResult<Json<Agent>> {
    let id = parse_agent_id(&agent_id)?;
    let registry = state.executions.registry();
    if let Some(active) = request.is_active {
        registry.set_active(&id, active)?;
    }
    Ok(Json(registry.get_agent(&id)?))
}

pub async fn list_configurations(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_agent_id(&agent_id)?;
    let versions = state.executions.registry().list_versions(&id)?;
    Ok(Json(json!({ "count": versions.len(), "data": versions })))
}

pub async fn get_configuration(
    State(state): State<ApiState>,
    Path((agent_id, version)): Path<(String, u32)>,
) -> ApiResult<Json<AgentConfigVersion>> {
    let id = parse_agent_id(&agent_id)?;
    Ok(Json(state.executions.registry().get_version(&id, version)?))
}

pub async fn create_configuration(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
    Json(config): Json<NewAgentConfig>,
) -> ApiResult<Json<AgentConfigVersion>> {
    let id = parse_agent_id(&agent_id)?;
    Ok(Json(state.executions.registry().create_version(&id, config)?))
}

pub async fn activate_configuration(
    State(state): State<ApiState>,
    Path((agent_id, version)): Path<(String, u32)>,
) -> ApiResult<Json<Agent>> {
    let id = parse_agent_id(&agent_id)?;
    let registry = state.executions.registry();
    registry.activate(&id, version)?;
    Ok(Json(registry.get_agent(&id)?))
}

/// Run the agent inline and return the recorded execution
pub async fn test_agent(
    State(state): State<ApiState>,
    Path(agent_id): Path<String>,
    Json(request): Json<NewExecution>,
) -> ApiResult<Json<ExecutionRecord>> {
    let id = parse_agent_id(&agent_id)?;
    let record = state
        .executions
        .run_now(&id, request)
        .await
        .map_err(ApiError::for_execution)?;
    Ok(Json(record))
}
