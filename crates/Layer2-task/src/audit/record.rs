//! Execution records

use super::registry::{AgentConfigVersion, AgentId};
use crate::normalizer::ActionLogEntry;
use crate::state::ExecutionStatus;
use agentpod_foundation::{Error, ExecutionRow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ExecutionId)
    }
}

/// Request to start an audited execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewExecution {
    /// Task text; the agent's task prompt is used when absent
    pub task_input: Option<String>,
    /// Values for `{key}` placeholders
    pub parameters: Map<String, Value>,
    /// Handed to the engine as secrets; never stored
    #[serde(skip_serializing)]
    pub sensitive_data: BTreeMap<String, String>,
    pub started_by: Option<String>,
}

/// Audited execution
///
/// `config_version_used` is fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub agent_id: AgentId,
    pub status: ExecutionStatus,
    pub task_input: Option<String>,
    pub parameters: Map<String, Value>,
    pub result: Option<Value>,
    pub execution_history: Vec<ActionLogEntry>,
    pub error_message: Option<String>,
    pub config_version_used: u32,
    pub started_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    pub(crate) fn new(agent_id: AgentId, config: &AgentConfigVersion, request: &NewExecution) -> Self {
        Self {
            id: ExecutionId::new(),
            agent_id,
            status: ExecutionStatus::Pending,
            task_input: request.task_input.clone(),
            parameters: request.parameters.clone(),
            result: None,
            execution_history: Vec::new(),
            error_message: None,
            config_version_used: config.version,
            started_by: request.started_by.clone(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to a terminal status, stamping `completed_at`
    pub(crate) fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    pub fn to_row(&self) -> Result<ExecutionRow> {
        Ok(ExecutionRow {
            id: self.id.to_string(),
            agent_id: self.agent_id.to_string(),
            status: self.status.as_str().to_string(),
            task_input: self.task_input.clone(),
            parameters: serde_json::to_string(&self.parameters)?,
            result: self.result.as_ref().map(serde_json::to_string).transpose()?,
            execution_history: serde_json::to_string(&self.execution_history)?,
            error_message: self.error_message.clone(),
            config_version_used: i64::from(self.config_version_used),
            started_by: self.started_by.clone(),
            started_at: self.started_at.to_rfc3339(),
            completed_at: self.completed_at.map(|t| t.to_rfc3339()),
        })
    }
}

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = Error;

    fn try_from(row: ExecutionRow) -> Result<Self> {
        let corrupt = |field: &str, detail: String| {
            Error::Storage(format!("execution {}: bad {}: {}", row.id, field, detail))
        };

        Ok(Self {
            id: row.id.parse().map_err(|e: uuid::Error| corrupt("id", e.to_string()))?,
            agent_id: row
                .agent_id
                .parse()
                .map_err(|e: uuid::Error| corrupt("agent_id", e.to_string()))?,
            status: row.status.parse().map_err(|e| corrupt("status", e))?,
            task_input: row.task_input.clone(),
            parameters: serde_json::from_str(&row.parameters)?,
            result: row.result.as_deref().map(serde_json::from_str).transpose()?,
            execution_history: serde_json::from_str(&row.execution_history)?,
            error_message: row.error_message.clone(),
            config_version_used: u32::try_from(row.config_version_used)
                .map_err(|e| corrupt("config_version_used", e.to_string()))?,
            started_by: row.started_by.clone(),
            started_at: parse_time(&row.started_at).map_err(|e| corrupt("started_at", e))?,
            completed_at: row
                .completed_at
                .as_deref()
                .map(parse_time)
                .transpose()
                .map_err(|e| corrupt("completed_at", e))?,
        })
    }
}

fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}
