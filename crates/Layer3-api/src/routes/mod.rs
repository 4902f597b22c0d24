//! Route table

mod agents;
mod executions;
mod health;
mod tasks;

use crate::state::ApiState;
use axum::routing::{get, post, put};
use axum::Router;

/// Routes under `/api/v1`
pub fn router() -> Router<ApiState> {
    Router::new()
        // Task lifecycle
        .route("/run-task", post(tasks::run_task))
        .route("/stop-task", put(tasks::stop_task))
        .route("/pause-task", put(tasks::pause_task))
        .route("/resume-task", put(tasks::resume_task))
        .route("/tasks", get(tasks::list_tasks))
        .route("/task/{task_id}", get(tasks::get_task).delete(tasks::delete_task))
        .route("/task/{task_id}/status", get(tasks::get_task_status))
        .route("/task/{task_id}/media", get(tasks::get_task_media))
        .route("/task/{task_id}/screenshots", get(tasks::get_task_screenshots))
        .route("/task/{task_id}/gif", get(tasks::get_task_gif))
        .route(
            "/task/{task_id}/output-file/{file_name}",
            get(tasks::get_task_output_file),
        )
        .route(
            "/download/output/{task_id}/{file_name}",
            get(tasks::download_output_file),
        )
        .route("/ping", get(health::ping))
        // Agents
        .route("/agents", get(agents::list_agents).post(agents::create_agent))
        .route("/agents/{agent_id}", get(agents::get_agent).put(agents::update_agent))
        .route(
            "/agents/{agent_id}/configurations",
            get(agents::list_configurations).post(agents::create_configuration),
        )
        .route(
            "/agents/{agent_id}/configurations/{version}",
            get(agents::get_configuration),
        )
        .route(
            "/agents/{agent_id}/configurations/{version}/activate",
            post(agents::activate_configuration),
        )
        .route("/agents/{agent_id}/test", post(agents::test_agent))
        // Executions
        .route("/executions", get(executions::list_executions))
        .route(
            "/executions/agent/{agent_id}",
            get(executions::list_agent_executions).post(executions::start_execution),
        )
        .route(
            "/executions/{execution_id}",
            get(executions::get_execution).delete(executions::delete_execution),
        )
        .route("/executions/{execution_id}/cancel", put(executions::cancel_execution))
}

/// Complete application with state attached
pub fn app(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", router())
        .with_state(state)
}
