//! JSON-backed engine result

use super::EngineHistory;
use serde_json::Value;

/// Result built from a JSON object with the well-known keys
/// (`final_result`, `urls`, `screenshots`, `model_actions`, `action_names`,
/// `errors`, `is_done`, `cookies`, `output_files`, `recordings`).
///
/// Keys that are missing or of the wrong type read as "not reported".
#[derive(Debug, Clone, Default)]
pub struct JsonHistory {
    value: Value,
}

impl JsonHistory {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn into_inner(self) -> Value {
        self.value
    }

    fn array(&self, key: &str) -> Option<&Vec<Value>> {
        self.value.get(key)?.as_array()
    }

    /// String entries only; nulls and other types are dropped
    fn strings(&self, key: &str) -> Option<Vec<String>> {
        self.array(key).map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }
}

impl EngineHistory for JsonHistory {
    fn final_result(&self) -> Option<String> {
        match self.value.get("final_result")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn urls(&self) -> Option<Vec<String>> {
        self.strings("urls")
    }

    fn screenshots(&self) -> Option<Vec<String>> {
        self.strings("screenshots")
    }

    fn model_actions(&self) -> Option<Vec<Value>> {
        self.array("model_actions").cloned()
    }

    fn action_names(&self) -> Option<Vec<String>> {
        self.strings("action_names")
    }

    fn errors(&self) -> Option<Vec<String>> {
        self.strings("errors")
    }

    fn is_done(&self) -> Option<bool> {
        self.value.get("is_done")?.as_bool()
    }

    fn cookies(&self) -> Option<Vec<Value>> {
        self.array("cookies").cloned()
    }

    fn output_files(&self) -> Option<Vec<String>> {
        self.strings("output_files")
    }

    fn recordings(&self) -> Option<Vec<String>> {
        self.strings("recordings")
    }
}
