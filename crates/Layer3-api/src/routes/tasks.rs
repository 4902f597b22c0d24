//! Task lifecycle endpoints

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;
use agentpod_foundation::{Error, Resource};
use agentpod_task::{BrowserData, RunTaskRequest, TaskPage, TaskRecord, TaskStatus};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

const DEFAULT_PAGE_LIMIT: usize = 10;
const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct TaskIdQuery {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TaskStepView {
    pub id: String,
    pub step: usize,
    pub evaluation_previous_goal: String,
    pub next_goal: String,
    pub url: String,
}

/// Full task record as returned by `GET /task/{task_id}`
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: String,
    pub task: String,
    pub live_url: Option<String>,
    pub output: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<TaskStepView>,
    pub browser_data: Option<BrowserData>,
    pub user_uploaded_files: Vec<String>,
    pub output_files: Vec<String>,
    pub public_share_url: Option<String>,
}

impl From<TaskRecord> for TaskView {
    fn from(record: TaskRecord) -> Self {
        let steps = record
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| TaskStepView {
                id: i.to_string(),
                step: i + 1,
                evaluation_previous_goal: step.evaluation_previous_goal,
                next_goal: step.next_goal,
                url: step.url,
            })
            .collect();

        Self {
            id: record.id.to_string(),
            task: record.task,
            live_url: record.live_url,
            output: record.output,
            status: record.status,
            created_at: record.created_at,
            finished_at: record.finished_at,
            steps,
            browser_data: record.browser_data,
            user_uploaded_files: record.user_uploaded_files,
            output_files: record.output_files,
            public_share_url: record.public_share_url,
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

pub async fn run_task(
    State(state): State<ApiState>,
    Json(request): Json<RunTaskRequest>,
) -> ApiResult<Json<Value>> {
    let id = state.tasks.create(request).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn stop_task(
    State(state): State<ApiState>,
    Query(query): Query<TaskIdQuery>,
) -> ApiResult<Json<Value>> {
    state.tasks.stop(&query.task_id)?;
    Ok(Json(json!({ "status": "stopped" })))
}

pub async fn pause_task(
    State(state): State<ApiState>,
    Query(query): Query<TaskIdQuery>,
) -> ApiResult<Json<Value>> {
    state.tasks.pause(&query.task_id)?;
    Ok(Json(json!({ "status": "paused" })))
}

pub async fn resume_task(
    State(state): State<ApiState>,
    Query(query): Query<TaskIdQuery>,
) -> ApiResult<Json<Value>> {
    state.tasks.resume(&query.task_id)?;
    Ok(Json(json!({ "status": "resumed" })))
}

pub async fn delete_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.tasks.delete(&task_id)?;
    Ok(Json(json!({ "status": "deleted" })))
}

// ============================================================================
// Reads
// ============================================================================

pub async fn get_task(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskView>> {
    Ok(Json(state.tasks.get(&task_id)?.into()))
}

pub async fn get_task_status(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatus>> {
    Ok(Json(state.tasks.status(&task_id)?))
}

pub async fn get_task_media(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let recordings = state.tasks.media(&task_id)?;
    Ok(Json(json!({ "recordings": recordings })))
}

pub async fn get_task_screenshots(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let screenshots = state.tasks.screenshots(&task_id)?;
    Ok(Json(json!({ "screenshots": screenshots })))
}

pub async fn get_task_gif(
    State(state): State<ApiState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let gif = state.tasks.gif(&task_id)?;
    Ok(Json(json!({ "gif": gif })))
}

pub async fn get_task_output_file(
    State(state): State<ApiState>,
    Path((task_id, file_name)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let download_url = state.tasks.output_file(&task_id, &file_name)?;
    Ok(Json(json!({ "download_url": download_url })))
}

pub async fn list_tasks(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<TaskPage>> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if page == 0 || limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("page must be >= 1 and limit within 1..={}", MAX_PAGE_LIMIT),
        ));
    }
    Ok(Json(state.tasks.list(page, limit)))
}

// ============================================================================
// Downloads
// ============================================================================

/// Serve a recorded output file from the outputs directory
pub async fn download_output_file(
    State(state): State<ApiState>,
    Path((task_id, file_name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    // resolves the task and checks the file was recorded
    state.tasks.output_file(&task_id, &file_name)?;
    if file_name.contains(['/', '\\']) || file_name == ".." {
        return Err(Error::not_found(Resource::OutputFile, &file_name).into());
    }

    let path = state.outputs_dir.join(&task_id).join(&file_name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| ApiError::from(Error::not_found(Resource::OutputFile, &file_name)))?;

    info!("Serving output file {} for task {}", file_name, task_id);
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}
