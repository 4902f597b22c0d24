//! Shared handler state

use agentpod_task::{ExecutionCoordinator, TaskService};
use std::path::PathBuf;

#[derive(Clone)]
pub struct ApiState {
    pub tasks: TaskService,
    pub executions: ExecutionCoordinator,
    /// Root of `{task_id}/{file_name}` output files
    pub outputs_dir: PathBuf,
}

impl ApiState {
    pub fn new(tasks: TaskService, executions: ExecutionCoordinator, outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            tasks,
            executions,
            outputs_dir: outputs_dir.into(),
        }
    }
}
