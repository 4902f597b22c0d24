//! Execution Coordinator
//!
//! Audited runs of a configured agent. No pause support; cancellation only while
//! pending or running. Each execution pins the configuration version current at
//! creation and snapshots it, so later versions never affect it.
//!
//! Sink writes happen under the coordinator lock, so audit rows follow the same
//! order as the in-memory transitions.

use super::record::{ExecutionId, ExecutionRecord, NewExecution};
use super::registry::{AgentConfigVersion, AgentId, AgentRegistry};
use super::sink::AuditSink;
use crate::engine::{AutomationEngine, CancelOnlyObserver, EngineError, EngineRequest};
use crate::normalizer::normalize;
use crate::service::TaskServiceConfig;
use crate::settings::TaskSettings;
use crate::state::ExecutionStatus;
use agentpod_foundation::{Error, Resource, Result};
use agentpod_provider::ProviderFactory;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

struct ExecutionEntry {
    record: ExecutionRecord,
    config: AgentConfigVersion,
    task_prompt: String,
    sensitive_data: BTreeMap<String, String>,
}

#[derive(Default)]
struct CoordinatorInner {
    entries: HashMap<ExecutionId, ExecutionEntry>,
    units: HashMap<ExecutionId, CancellationToken>,
}

/// What the engine call needs, captured when the execution starts running
struct RunPlan {
    config: AgentConfigVersion,
    task: String,
    parameters: Map<String, Value>,
    sensitive_data: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct ExecutionCoordinator {
    registry: AgentRegistry,
    engine: Arc<dyn AutomationEngine>,
    sink: Arc<dyn AuditSink>,
    factory: ProviderFactory,
    config: TaskServiceConfig,
    inner: Arc<Mutex<CoordinatorInner>>,
}

impl ExecutionCoordinator {
    pub fn new(
        registry: AgentRegistry,
        engine: Arc<dyn AutomationEngine>,
        sink: Arc<dyn AuditSink>,
        config: TaskServiceConfig,
    ) -> Self {
        Self {
            registry,
            engine,
            sink,
            factory: ProviderFactory::new(),
            config,
            inner: Arc::new(Mutex::new(CoordinatorInner::default())),
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    // ========================================================================
    // Create / Run
    // ========================================================================

    /// Create a pending execution of the agent's current configuration
    pub fn create(&self, agent_id: &AgentId, request: NewExecution) -> Result<ExecutionRecord> {
        let (agent, config) = self.registry.current_config(agent_id)?;
        if !agent.is_active {
            return Err(Error::InvalidInput(format!("agent {} is not active", agent_id)));
        }

        let record = ExecutionRecord::new(agent.id, &config, &request);
        let mut inner = self.inner.lock();
        self.sink.record_created(&record)?;
        inner.entries.insert(
            record.id,
            ExecutionEntry {
                record: record.clone(),
                config,
                task_prompt: agent.task_prompt,
                sensitive_data: request.sensitive_data,
            },
        );

        info!(
            "Execution {} created for agent {} (config v{})",
            record.id, agent_id, record.config_version_used
        );
        Ok(record)
    }

    /// Schedule a pending execution in the background
    pub fn run(&self, id: &ExecutionId) -> Result<JoinHandle<()>> {
        let unit = self.register(id)?;
        let coordinator = self.clone();
        let id = *id;

        let future = async move {
            let _guard = UnitGuard {
                inner: Arc::clone(&coordinator.inner),
                id,
            };
            match coordinator.execute(id, unit).await {
                Ok(()) => {}
                Err(Error::Cancelled) => debug!("Execution {} cancelled", id),
                Err(e) => warn!("Execution {} failed: {}", id, e),
            }
        };
        Ok(tokio::spawn(future.instrument(info_span!("execution", execution_id = %id))))
    }

    /// Create and schedule in one call
    pub fn start(&self, agent_id: &AgentId, request: NewExecution) -> Result<ExecutionRecord> {
        let record = self.create(agent_id, request)?;
        self.run(&record.id)?;
        Ok(record)
    }

    /// Create and run inline, returning the final record.
    ///
    /// Engine faults are recorded first and then returned as `Error::EngineFault`.
    pub async fn run_now(&self, agent_id: &AgentId, request: NewExecution) -> Result<ExecutionRecord> {
        let record = self.create(agent_id, request)?;
        let id = record.id;
        let unit = self.register(&id)?;
        let _guard = UnitGuard {
            inner: Arc::clone(&self.inner),
            id,
        };

        match self
            .execute(id, unit)
            .instrument(info_span!("execution", execution_id = %id))
            .await
        {
            Ok(()) | Err(Error::Cancelled) => self.get(&id),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Cancel / Read / Delete
    // ========================================================================

    /// PENDING or RUNNING -> CANCELLED
    pub fn cancel(&self, id: &ExecutionId) -> Result<ExecutionRecord> {
        let mut inner = self.inner.lock();
        let entry = inner
            .entries
            .get_mut(id)
            .ok_or_else(|| Error::not_found(Resource::Execution, id))?;

        let current = entry.record.status;
        if !current.is_cancellable() {
            warn!("Refused cancel on execution {}: {}", id, current);
            return Err(Error::invalid_transition(id, current, "cancel"));
        }

        entry.record.finish(ExecutionStatus::Cancelled);
        let record = entry.record.clone();
        self.write_update(&record);

        if let Some(token) = inner.units.remove(id) {
            token.cancel();
        }
        info!("Execution {} cancel: {} -> cancelled", id, current);
        Ok(record)
    }

    pub fn get(&self, id: &ExecutionId) -> Result<ExecutionRecord> {
        self.inner
            .lock()
            .entries
            .get(id)
            .map(|e| e.record.clone())
            .ok_or_else(|| Error::not_found(Resource::Execution, id))
    }

    /// Every execution, newest first
    pub fn list(&self, skip: usize, limit: usize) -> Vec<ExecutionRecord> {
        self.list_where(skip, limit, |_| true)
    }

    /// Executions of one agent, newest first
    pub fn list_for_agent(&self, agent_id: &AgentId, skip: usize, limit: usize) -> Vec<ExecutionRecord> {
        self.list_where(skip, limit, |r| r.agent_id == *agent_id)
    }

    fn list_where(
        &self,
        skip: usize,
        limit: usize,
        keep: impl Fn(&ExecutionRecord) -> bool,
    ) -> Vec<ExecutionRecord> {
        let inner = self.inner.lock();
        let mut records: Vec<&ExecutionRecord> = inner
            .entries
            .values()
            .map(|e| &e.record)
            .filter(|r| keep(r))
            .collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.into_iter().skip(skip).take(limit).cloned().collect()
    }

    /// Remove an execution that is no longer pending or running
    pub fn delete(&self, id: &ExecutionId) -> Result<()> {
        let mut inner = self.inner.lock();
        let status = inner
            .entries
            .get(id)
            .map(|e| e.record.status)
            .ok_or_else(|| Error::not_found(Resource::Execution, id))?;
        if !status.is_terminal() {
            return Err(Error::invalid_transition(id, status, "delete"));
        }

        self.sink.record_deleted(id)?;
        inner.entries.remove(id);
        info!("Execution {} deleted", id);
        Ok(())
    }

    pub fn in_flight(&self) -> usize {
        self.inner.lock().units.len()
    }

    // ========================================================================
    // Unit body
    // ========================================================================

    fn register(&self, id: &ExecutionId) -> Result<CancellationToken> {
        let mut inner = self.inner.lock();
        let status = inner
            .entries
            .get(id)
            .map(|e| e.record.status)
            .ok_or_else(|| Error::not_found(Resource::Execution, id))?;
        if status != ExecutionStatus::Pending || inner.units.contains_key(id) {
            return Err(Error::invalid_transition(id, status, "run"));
        }

        let token = CancellationToken::new();
        inner.units.insert(*id, token.clone());
        Ok(token)
    }

    async fn execute(&self, id: ExecutionId, unit: CancellationToken) -> Result<()> {
        let plan = self.begin(&id).ok_or(Error::Cancelled)?;

        let request = match self.prepare(&id, plan) {
            Ok(request) => request,
            Err(e) => {
                self.finish_if_running(&id, |record| {
                    record.error_message = Some(e.to_string());
                    record.finish(ExecutionStatus::Failed);
                });
                return Err(e);
            }
        };

        let observer = CancelOnlyObserver::new(unit.clone());
        let result = tokio::select! {
            biased;
            _ = unit.cancelled() => Err(EngineError::Cancelled),
            result = self.engine.run(request, &observer) => result,
        };

        match result {
            Ok(history) => {
                let normalized = normalize(history.as_ref());
                self.finish_if_running(&id, |record| {
                    record.result = Some(normalized.audit_payload());
                    record.execution_history = normalized.actions;
                    record.finish(ExecutionStatus::Completed);
                });
                Ok(())
            }
            // cancel() already wrote the terminal status
            Err(EngineError::Cancelled) => Err(Error::Cancelled),
            Err(EngineError::Fault(message)) => {
                self.finish_if_running(&id, |record| {
                    record.error_message = Some(message.clone());
                    record.finish(ExecutionStatus::Failed);
                });
                Err(Error::EngineFault(message))
            }
        }
    }

    /// PENDING -> RUNNING; `None` if cancelled first
    fn begin(&self, id: &ExecutionId) -> Option<RunPlan> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.get_mut(id)?;
        if entry.record.status != ExecutionStatus::Pending {
            debug!("Execution {} not started, status is {}", id, entry.record.status);
            return None;
        }

        entry.record.status = ExecutionStatus::Running;
        let record = entry.record.clone();
        let plan = RunPlan {
            config: entry.config.clone(),
            task: record
                .task_input
                .clone()
                .unwrap_or_else(|| entry.task_prompt.clone()),
            parameters: record.parameters.clone(),
            sensitive_data: entry.sensitive_data.clone(),
        };
        self.write_update(&record);
        info!("Execution {} started", id);
        Some(plan)
    }

    /// Resolve the LLM and build the engine request from the pinned snapshot
    fn prepare(&self, id: &ExecutionId, plan: RunPlan) -> Result<EngineRequest> {
        let RunPlan {
            config,
            task,
            parameters,
            sensitive_data,
        } = plan;

        let llm = self
            .factory
            .resolve(config.llm_model.as_deref(), &config.llm_config)?;

        let mut settings = TaskSettings::from_maps([&config.browser_settings, &config.agent_settings])?;
        settings.llm_model = config.llm_model.clone();
        settings.llm_config = config.llm_config.clone();
        settings.secrets = sensitive_data;
        settings.validate()?;

        Ok(EngineRequest {
            run_id: id.to_string(),
            task: substitute(&task, &parameters),
            settings,
            llm,
            browser: self.config.browser.clone(),
            step_timeout: self.config.step_timeout,
        })
    }

    /// Apply a terminal outcome unless the execution left RUNNING meanwhile
    fn finish_if_running(&self, id: &ExecutionId, f: impl FnOnce(&mut ExecutionRecord)) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.get_mut(id) else {
            return false;
        };
        if entry.record.status != ExecutionStatus::Running {
            debug!("Execution {} outcome discarded, status is {}", id, entry.record.status);
            return false;
        }

        f(&mut entry.record);
        let record = entry.record.clone();
        self.write_update(&record);
        info!("Execution {} {}", id, record.status);
        true
    }

    fn write_update(&self, record: &ExecutionRecord) {
        if let Err(e) = self.sink.record_updated(record) {
            warn!("Failed to write audit row for execution {}: {}", record.id, e);
        }
    }
}

/// Deregisters the unit when the run completes or is dropped
struct UnitGuard {
    inner: Arc<Mutex<CoordinatorInner>>,
    id: ExecutionId,
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        self.inner.lock().units.remove(&self.id);
    }
}

/// Replace `{key}` placeholders with parameter values
pub fn substitute(template: &str, parameters: &Map<String, Value>) -> String {
    parameters.iter().fold(template.to_string(), |text, (key, value)| {
        let replacement = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        text.replace(&format!("{{{}}}", key), &replacement)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::registry::NewAgentConfig;
    use crate::audit::sink::MemorySink;
    use crate::engine::{ScriptedEngine, ScriptedStep};
    use serde_json::json;
    use std::time::Duration;

    fn setup(engine: ScriptedEngine) -> (ExecutionCoordinator, Arc<MemorySink>, AgentId) {
        let registry = AgentRegistry::new();
        let config = NewAgentConfig {
            llm_model: Some("gpt-4o".to_string()),
            llm_config: json!({"api_key": "sk-test"}).as_object().cloned().unwrap(),
            ..Default::default()
        };
        let agent = registry.create_agent("pricing", "find the price of {item}", config);
        let sink = Arc::new(MemorySink::new());
        let coordinator = ExecutionCoordinator::new(
            registry,
            Arc::new(engine),
            sink.clone(),
            TaskServiceConfig::default(),
        );
        (coordinator, sink, agent.id)
    }

    fn with_item(item: &str) -> NewExecution {
        let mut request = NewExecution::default();
        request.parameters.insert("item".to_string(), json!(item));
        request
    }

    #[test]
    fn test_substitute() {
        let params = json!({"item": "lamp", "count": 3});
        let text = substitute("buy {count} of {item}, not {other}", params.as_object().unwrap());
        assert_eq!(text, "buy 3 of lamp, not {other}");
    }

    #[tokio::test]
    async fn test_run_now_completes() {
        let engine = ScriptedEngine::new()
            .step(ScriptedStep::visit("https://shop.example").action("search"))
            .final_result("$42");
        let (coordinator, sink, agent_id) = setup(engine);

        let record = coordinator.run_now(&agent_id, with_item("lamp")).await.unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.config_version_used, 1);

        let result = record.result.unwrap();
        assert_eq!(result["final_result"], "$42");
        assert_eq!(result["action_names"], json!(["search"]));
        assert_eq!(record.execution_history.len(), 1);
        assert_eq!(record.execution_history[0].action, "search");

        // created, running, completed
        assert_eq!(sink.writes(), 3);
        assert_eq!(sink.get(&record.id).unwrap().status, ExecutionStatus::Completed);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_run_now_reraises_fault_after_recording() {
        let engine = ScriptedEngine::new().step(ScriptedStep::visit("https://shop.example").fail("captcha"));
        let (coordinator, sink, agent_id) = setup(engine);

        let err = coordinator.run_now(&agent_id, with_item("lamp")).await.unwrap_err();
        assert!(matches!(&err, Error::EngineFault(m) if m == "captcha"));

        let records = coordinator.list_for_agent(&agent_id, 0, 10);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, ExecutionStatus::Failed);
        assert_eq!(records[0].error_message.as_deref(), Some("captcha"));
        assert_eq!(sink.get(&records[0].id).unwrap().status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancel_is_not_overwritten() {
        let engine = ScriptedEngine::new()
            .step(ScriptedStep::visit("https://shop.example").delay(Duration::from_millis(100)));
        let (coordinator, _sink, agent_id) = setup(engine);

        let record = coordinator.create(&agent_id, with_item("lamp")).unwrap();
        let handle = coordinator.run(&record.id).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let cancelled = coordinator.cancel(&record.id).unwrap();
        assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
        handle.await.unwrap();

        let after = coordinator.get(&record.id).unwrap();
        assert_eq!(after.status, ExecutionStatus::Cancelled);
        assert!(after.result.is_none());

        let err = coordinator.cancel(&record.id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { operation: "cancel", .. }));
    }

    #[tokio::test]
    async fn test_cancel_before_run() {
        let (coordinator, _sink, agent_id) = setup(ScriptedEngine::echo());
        let record = coordinator.create(&agent_id, NewExecution::default()).unwrap();
        coordinator.cancel(&record.id).unwrap();

        let err = coordinator.run(&record.id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { operation: "run", .. }));
    }

    #[tokio::test]
    async fn test_inactive_agent_is_rejected() {
        let (coordinator, _sink, agent_id) = setup(ScriptedEngine::echo());
        coordinator.registry().set_active(&agent_id, false).unwrap();

        let err = coordinator.create(&agent_id, NewExecution::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_unsupported_model_fails_execution() {
        let (coordinator, _sink, agent_id) = setup(ScriptedEngine::echo());
        let config = NewAgentConfig {
            llm_model: Some("mistral-large".to_string()),
            ..Default::default()
        };
        coordinator.registry().create_version(&agent_id, config).unwrap();

        let err = coordinator.run_now(&agent_id, NewExecution::default()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let record = &coordinator.list_for_agent(&agent_id, 0, 1)[0];
        assert_eq!(record.status, ExecutionStatus::Failed);
        assert_eq!(record.config_version_used, 2);
    }

    #[tokio::test]
    async fn test_delete_refused_while_pending() {
        let (coordinator, sink, agent_id) = setup(ScriptedEngine::echo());
        let record = coordinator.create(&agent_id, NewExecution::default()).unwrap();

        let err = coordinator.delete(&record.id).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { operation: "delete", .. }));

        coordinator.cancel(&record.id).unwrap();
        coordinator.delete(&record.id).unwrap();
        assert!(coordinator.get(&record.id).unwrap_err().is_not_found(Resource::Execution));
        assert!(sink.get(&record.id).is_none());
    }

    #[test]
    fn test_list_all_and_per_agent() {
        let (coordinator, _sink, agent_id) = setup(ScriptedEngine::echo());
        let other = coordinator
            .registry()
            .create_agent("weather", "check the weather", NewAgentConfig::default());

        let first = coordinator.create(&agent_id, with_item("lamp")).unwrap();
        coordinator.create(&other.id, NewExecution::default()).unwrap();
        coordinator.create(&agent_id, with_item("desk")).unwrap();

        assert_eq!(coordinator.list(0, 100).len(), 3);
        assert_eq!(coordinator.list(1, 1).len(), 1);
        assert_eq!(coordinator.list_for_agent(&agent_id, 0, 100).len(), 2);
        assert_eq!(coordinator.list_for_agent(&other.id, 0, 100).len(), 1);
        assert!(coordinator
            .list(0, 100)
            .iter()
            .any(|record| record.id == first.id));
    }
}
