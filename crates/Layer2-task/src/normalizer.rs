//! Result Normalizer
//!
//! Pure conversion from the engine's optional accessors to canonical fields. A
//! missing accessor reads as empty (lists) or unknown (scalars). Actions that are
//! not JSON objects are skipped.

use crate::engine::EngineHistory;
use crate::task::StepDescriptor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One entry of an execution's action log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub action: String,
    pub parameters: Value,
    pub timestamp: String,
    pub result: String,
}

/// Canonical view of an engine result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResult {
    pub output: Option<String>,
    pub urls: Vec<String>,
    pub screenshots: Vec<String>,
    pub steps: Vec<StepDescriptor>,
    /// Position in the engine's action list of each entry in `steps`
    pub step_indices: Vec<usize>,
    pub actions: Vec<ActionLogEntry>,
    pub action_names: Vec<String>,
    pub errors: Vec<String>,
    /// Engines that do not say are taken to have finished
    pub is_done: bool,
    pub cookies: Option<Vec<Value>>,
    pub output_files: Vec<String>,
    pub recordings: Vec<String>,
}

impl NormalizedResult {
    /// Result payload stored on audited executions
    pub fn audit_payload(&self) -> Value {
        json!({
            "final_result": self.output,
            "urls": self.urls,
            "screenshots": self.screenshots,
            "action_names": self.action_names,
            "errors": self.errors,
            "is_done": self.is_done,
        })
    }
}

pub fn normalize(history: &dyn EngineHistory) -> NormalizedResult {
    let raw_actions = history.model_actions().unwrap_or_default();

    let mut steps = Vec::with_capacity(raw_actions.len());
    let mut step_indices = Vec::with_capacity(raw_actions.len());
    let mut actions = Vec::with_capacity(raw_actions.len());
    for (index, raw) in raw_actions.iter().enumerate() {
        let Some(object) = raw.as_object() else {
            continue;
        };
        let name = action_name(object);
        steps.push(step_descriptor(index, &name, object));
        step_indices.push(index);
        actions.push(action_entry(name, object));
    }

    let action_names = history
        .action_names()
        .unwrap_or_else(|| actions.iter().map(|a| a.action.clone()).collect());

    NormalizedResult {
        output: history.final_result(),
        urls: history.urls().unwrap_or_default(),
        screenshots: history.screenshots().unwrap_or_default(),
        steps,
        step_indices,
        actions,
        action_names,
        errors: history.errors().unwrap_or_default(),
        is_done: history.is_done().unwrap_or(true),
        cookies: history.cookies(),
        output_files: history.output_files().unwrap_or_default(),
        recordings: history.recordings().unwrap_or_default(),
    }
}

/// `action` key if present, else the first key that names an action
fn action_name(object: &Map<String, Value>) -> String {
    if let Some(name) = object.get("action").and_then(Value::as_str) {
        return name.to_string();
    }
    object
        .keys()
        .find(|k| !matches!(k.as_str(), "interacted_element" | "url" | "parameters" | "timestamp" | "result"))
        .cloned()
        .unwrap_or_else(|| "unknown".to_string())
}

fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

fn step_descriptor(index: usize, name: &str, object: &Map<String, Value>) -> StepDescriptor {
    StepDescriptor {
        evaluation_previous_goal: text(object, "evaluation_previous_goal")
            .unwrap_or_else(|| format!("Step {} completed", index)),
        next_goal: text(object, "next_goal").unwrap_or_else(|| format!("Execute {}", name)),
        url: text(object, "url").unwrap_or_else(|| "unknown".to_string()),
    }
}

fn action_entry(action: String, object: &Map<String, Value>) -> ActionLogEntry {
    ActionLogEntry {
        action,
        parameters: object.get("parameters").cloned().unwrap_or_else(|| json!({})),
        timestamp: text(object, "timestamp").unwrap_or_else(|| Utc::now().to_rfc3339()),
        result: text(object, "result").unwrap_or_default(),
    }
}
