//! Scripted engine
//!
//! Deterministic engine that plays back a fixed list of steps. Used by tests and by
//! the binary when no remote automation worker is configured.

use super::{AutomationEngine, EngineError, EngineHistory, EngineRequest, JsonHistory, StepEvent, StepObserver};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// One scripted step
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub action: String,
    pub url: String,
    pub delay: Duration,
    pub screenshot: Option<String>,
    /// Fail with this message instead of completing the step
    pub fault: Option<String>,
}

impl ScriptedStep {
    pub fn visit(url: impl Into<String>) -> Self {
        Self {
            action: "go_to_url".to_string(),
            url: url.into(),
            delay: Duration::ZERO,
            screenshot: None,
            fault: None,
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn screenshot(mut self, reference: impl Into<String>) -> Self {
        self.screenshot = Some(reference.into());
        self
    }

    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.fault = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    steps: Vec<ScriptedStep>,
    final_result: Option<String>,
    cookies: Vec<Value>,
    output_files: Vec<String>,
    recordings: Vec<String>,
    live_url: Option<String>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// One step on `about:blank`, echoing the task as the result
    pub fn echo() -> Self {
        Self::new().step(ScriptedStep::visit("about:blank").action("done"))
    }

    pub fn step(mut self, step: ScriptedStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Fixed result text; defaults to an echo of the task
    pub fn final_result(mut self, result: impl Into<String>) -> Self {
        self.final_result = Some(result.into());
        self
    }

    pub fn cookie(mut self, cookie: Value) -> Self {
        self.cookies.push(cookie);
        self
    }

    pub fn output_file(mut self, file_name: impl Into<String>) -> Self {
        self.output_files.push(file_name.into());
        self
    }

    pub fn recording(mut self, reference: impl Into<String>) -> Self {
        self.recordings.push(reference.into());
        self
    }

    /// Reported on every step boundary
    pub fn live_url(mut self, url: impl Into<String>) -> Self {
        self.live_url = Some(url.into());
        self
    }
}

#[async_trait]
impl AutomationEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(
        &self,
        request: EngineRequest,
        observer: &dyn StepObserver,
    ) -> Result<Box<dyn EngineHistory>, EngineError> {
        let ceiling = request.settings.max_agent_steps as usize;
        let mut actions = Vec::new();

        for (index, step) in self.steps.iter().take(ceiling).enumerate() {
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            if let Some(message) = &step.fault {
                return Err(EngineError::Fault(message.clone()));
            }

            debug!("[{}] step {}: {} {}", request.run_id, index, step.action, step.url);
            actions.push(json!({
                "action": step.action,
                "url": step.url,
                "parameters": { "url": step.url },
                "result": "ok",
            }));

            observer
                .on_step(StepEvent {
                    index,
                    action: Some(step.action.clone()),
                    url: Some(step.url.clone()),
                    screenshot: step.screenshot.clone(),
                    live_url: self.live_url.clone(),
                    ..Default::default()
                })
                .await?;
        }

        let done = self.steps.len() <= ceiling;
        let executed = &self.steps[..self.steps.len().min(ceiling)];
        let history = json!({
            "final_result": self
                .final_result
                .clone()
                .unwrap_or_else(|| format!("Completed: {}", request.task)),
            "urls": executed.iter().map(|s| s.url.clone()).collect::<Vec<_>>(),
            "screenshots": executed.iter().filter_map(|s| s.screenshot.clone()).collect::<Vec<_>>(),
            "model_actions": actions,
            "action_names": executed.iter().map(|s| s.action.clone()).collect::<Vec<_>>(),
            "errors": Vec::<String>::new(),
            "is_done": done,
            "cookies": self.cookies,
            "output_files": self.output_files,
            "recordings": self.recordings,
        });

        Ok(Box::new(JsonHistory::new(history)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CancelOnlyObserver;
    use crate::testing::request_for;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_plays_steps_within_ceiling() {
        let engine = ScriptedEngine::new()
            .step(ScriptedStep::visit("https://a.example").screenshot("a.png"))
            .step(ScriptedStep::visit("https://b.example"))
            .step(ScriptedStep::visit("https://c.example"));

        let mut request = request_for("browse");
        request.settings.max_agent_steps = 2;

        let observer = CancelOnlyObserver::new(CancellationToken::new());
        let history = engine.run(request, &observer).await.unwrap();

        assert_eq!(history.urls().unwrap(), vec!["https://a.example", "https://b.example"]);
        assert_eq!(history.screenshots().unwrap(), vec!["a.png"]);
        assert_eq!(history.is_done(), Some(false));
        assert_eq!(history.final_result().as_deref(), Some("Completed: browse"));
    }

    #[tokio::test]
    async fn test_fault_step() {
        let engine = ScriptedEngine::new()
            .step(ScriptedStep::visit("https://a.example"))
            .step(ScriptedStep::visit("https://b.example").fail("navigation timeout"));

        let observer = CancelOnlyObserver::new(CancellationToken::new());
        let err = engine.run(request_for("browse"), &observer).await.err().unwrap();
        assert_eq!(err, EngineError::Fault("navigation timeout".to_string()));
    }

    #[tokio::test]
    async fn test_cancelled_observer_stops_run() {
        let token = CancellationToken::new();
        token.cancel();
        let observer = CancelOnlyObserver::new(token);

        let err = ScriptedEngine::echo()
            .run(request_for("browse"), &observer)
            .await
            .err()
            .unwrap();
        assert_eq!(err, EngineError::Cancelled);
    }
}
