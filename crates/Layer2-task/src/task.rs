//! Task record and related types

use crate::state::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a task (random v4, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a new random TaskId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(TaskId)
    }
}

/// One step of progress as shown to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub evaluation_previous_goal: String,
    pub next_goal: String,
    pub url: String,
}

/// Browser session artifacts kept when `save_browser_data` is set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrowserData {
    pub cookies: Vec<serde_json::Value>,
}

/// Interactive task record
///
/// `steps`, `screenshots`, `recordings` and `output_files` are append-only.
/// `finished_at` is set exactly when `status` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output: Option<String>,
    pub steps: Vec<StepDescriptor>,
    pub screenshots: Vec<String>,
    pub recordings: Vec<String>,
    pub output_files: Vec<String>,
    pub user_uploaded_files: Vec<String>,
    pub browser_data: Option<BrowserData>,
    pub live_url: Option<String>,
    pub public_share_url: Option<String>,
}

impl TaskRecord {
    pub fn new(id: TaskId, task: impl Into<String>) -> Self {
        Self {
            id,
            task: task.into(),
            status: TaskStatus::Created,
            created_at: Utc::now(),
            finished_at: None,
            output: None,
            steps: Vec::new(),
            screenshots: Vec::new(),
            recordings: Vec::new(),
            output_files: Vec::new(),
            user_uploaded_files: Vec::new(),
            browser_data: None,
            live_url: None,
            public_share_url: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move to `next` if legal, stamping `finished_at` for terminal states
    pub(crate) fn transition(&mut self, next: TaskStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        true
    }

    /// Whether `file_name` was recorded as an output of this task
    pub fn has_output_file(&self, file_name: &str) -> bool {
        self.output_files.iter().any(|f| f == file_name)
    }
}

/// Simplified record used by listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub task: String,
    pub output: Option<String>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub live_url: Option<String>,
}

impl From<&TaskRecord> for TaskSummary {
    fn from(record: &TaskRecord) -> Self {
        Self {
            id: record.id,
            task: record.task.clone(),
            output: record.output.clone(),
            status: record.status,
            created_at: record.created_at,
            finished_at: record.finished_at,
            live_url: record.live_url.clone(),
        }
    }
}

/// One page of the task listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPage {
    pub tasks: Vec<TaskSummary>,
    pub total_pages: usize,
    pub page: usize,
    pub limit: usize,
    pub total_count: usize,
}

impl TaskPage {
    /// `ceil(total / limit)`, never less than 1
    pub fn total_pages(total_count: usize, limit: usize) -> usize {
        if total_count == 0 || limit == 0 {
            return 1;
        }
        total_count.div_ceil(limit)
    }
}
