//! Task service
//!
//! Entry point for the interactive task surface. Validates and resolves everything a
//! run needs before a record exists, then hands the record to the runner. Reads and
//! lifecycle calls take the caller's id string; ids that do not parse are simply not
//! found.

use crate::engine::{AutomationEngine, EngineRequest};
use crate::lifecycle::LifecycleController;
use crate::runner::ExecutionRunner;
use crate::settings::RunTaskRequest;
use crate::state::TaskStatus;
use crate::store::TaskStore;
use crate::task::{TaskId, TaskPage, TaskRecord, TaskSummary};
use agentpod_foundation::{BrowserConfig, Error, PodConfig, Resource, Result};
use agentpod_provider::ProviderFactory;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Prefix of output file download references
pub const OUTPUT_DOWNLOAD_PREFIX: &str = "/api/v1/download/output";

/// Prefix of public share links
pub const SHARE_PREFIX: &str = "/share";

#[derive(Debug, Clone)]
pub struct TaskServiceConfig {
    /// In-flight units allowed before new tasks are refused
    pub max_concurrent: usize,
    /// Per-step budget handed to the engine
    pub step_timeout: Duration,
    pub browser: BrowserConfig,
}

impl Default for TaskServiceConfig {
    fn default() -> Self {
        Self::from(&PodConfig::default())
    }
}

impl From<&PodConfig> for TaskServiceConfig {
    fn from(config: &PodConfig) -> Self {
        Self {
            max_concurrent: config.tasks.max_concurrent,
            step_timeout: Duration::from_secs(config.tasks.timeout_secs),
            browser: config.browser.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TaskService {
    store: TaskStore,
    lifecycle: LifecycleController,
    runner: ExecutionRunner,
    factory: ProviderFactory,
    config: TaskServiceConfig,
}

impl TaskService {
    pub fn new(engine: Arc<dyn AutomationEngine>, config: TaskServiceConfig) -> Self {
        Self::with_store(TaskStore::new(), engine, config)
    }

    pub fn with_store(store: TaskStore, engine: Arc<dyn AutomationEngine>, config: TaskServiceConfig) -> Self {
        Self {
            lifecycle: LifecycleController::new(store.clone()),
            runner: ExecutionRunner::new(store.clone(), engine),
            factory: ProviderFactory::new(),
            store,
            config,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn engine_name(&self) -> &'static str {
        self.runner.engine_name()
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Validate, resolve the LLM, then create the record and launch its unit under
    /// the concurrency limit
    pub async fn create(&self, request: RunTaskRequest) -> Result<TaskId> {
        let RunTaskRequest { task, settings } = request;
        if task.trim().is_empty() {
            return Err(Error::InvalidInput("task must not be empty".to_string()));
        }
        settings.validate()?;

        let llm = self
            .factory
            .resolve(settings.llm_model.as_deref(), &settings.llm_config)?;
        if !llm.is_available() {
            warn!("No API key for {} ({}); the engine may fail", llm.model(), llm.kind());
        }

        let model = llm.model().to_string();
        let browser = self.config.browser.clone();
        let step_timeout = self.config.step_timeout;
        let public_share = settings.enable_public_share;
        let uploads = settings.included_file_names.clone();

        let (id, _) = self.runner.launch_new(
            task.clone(),
            |record| {
                if public_share {
                    record.public_share_url = Some(format!("{}/{}", SHARE_PREFIX, record.id));
                }
                record.user_uploaded_files = uploads;
            },
            self.config.max_concurrent,
            |id| EngineRequest {
                run_id: id.to_string(),
                task,
                settings,
                llm,
                browser,
                step_timeout,
            },
        )?;
        info!("Task {} created with model {}", id, model);
        Ok(id)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub fn pause(&self, id: &str) -> Result<()> {
        self.lifecycle.pause(&parse_id(id)?)
    }

    pub fn resume(&self, id: &str) -> Result<()> {
        self.lifecycle.resume(&parse_id(id)?)
    }

    pub fn stop(&self, id: &str) -> Result<()> {
        self.lifecycle.stop(&parse_id(id)?)
    }

    /// Remove a record that has no running unit
    pub fn delete(&self, id: &str) -> Result<TaskRecord> {
        let task_id = parse_id(id)?;
        match self.store.remove_inactive(&task_id) {
            Ok(Some(record)) => {
                info!("Task {} deleted", task_id);
                Ok(record)
            }
            Ok(None) => Err(Error::not_found(Resource::Task, id)),
            Err(status) => Err(Error::invalid_transition(id, status, "delete")),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn get(&self, id: &str) -> Result<TaskRecord> {
        let task_id = parse_id(id)?;
        self.store
            .get(&task_id)
            .ok_or_else(|| Error::not_found(Resource::Task, id))
    }

    pub fn status(&self, id: &str) -> Result<TaskStatus> {
        let task_id = parse_id(id)?;
        self.store
            .status(&task_id)
            .ok_or_else(|| Error::not_found(Resource::Task, id))
    }

    /// Recording references
    pub fn media(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.get(id)?.recordings)
    }

    pub fn screenshots(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.get(id)?.screenshots)
    }

    /// Animated summary; never generated
    pub fn gif(&self, id: &str) -> Result<Option<String>> {
        self.get(id)?;
        Ok(None)
    }

    /// Download reference for a recorded output file
    pub fn output_file(&self, id: &str, file_name: &str) -> Result<String> {
        let record = self.get(id)?;
        if !record.has_output_file(file_name) {
            return Err(Error::not_found(Resource::OutputFile, file_name));
        }
        Ok(format!("{}/{}/{}", OUTPUT_DOWNLOAD_PREFIX, record.id, file_name))
    }

    /// 1-based page of simplified records, newest first
    pub fn list(&self, page: usize, limit: usize) -> TaskPage {
        let (records, total_count) = self.store.list(page, limit);
        TaskPage {
            tasks: records.iter().map(TaskSummary::from).collect(),
            total_pages: TaskPage::total_pages(total_count, limit),
            page,
            limit,
            total_count,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.store.in_flight()
    }
}

fn parse_id(id: &str) -> Result<TaskId> {
    id.parse()
        .map_err(|_| Error::not_found(Resource::Task, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ScriptedEngine, ScriptedStep};
    use crate::testing::wait_for_status;

    fn service(engine: ScriptedEngine) -> TaskService {
        TaskService::new(Arc::new(engine), TaskServiceConfig::default())
    }

    #[tokio::test]
    async fn test_create_runs_to_finished() {
        let service = service(ScriptedEngine::echo().output_file("log.txt"));
        let id = service.create(RunTaskRequest::new("open example.com")).await.unwrap();

        wait_for_status(service.store(), &id, TaskStatus::Finished).await;
        let record = service.get(&id.to_string()).unwrap();
        assert_eq!(record.output.as_deref(), Some("Completed: open example.com"));
        assert_eq!(
            service.output_file(&id.to_string(), "log.txt").unwrap(),
            format!("/api/v1/download/output/{}/log.txt", id)
        );
    }

    #[tokio::test]
    async fn test_unsupported_model_creates_nothing() {
        let service = service(ScriptedEngine::echo());
        let mut request = RunTaskRequest::new("open example.com");
        request.settings.llm_model = Some("mistral-large".to_string());

        let err = service.create(request).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_settings_create_nothing() {
        let service = service(ScriptedEngine::echo());
        let mut request = RunTaskRequest::new("open example.com");
        request.settings.browser_viewport_width = 0;

        assert!(matches!(service.create(request).await, Err(Error::Config(_))));
        assert!(matches!(
            service.create(RunTaskRequest::new("  ")).await,
            Err(Error::InvalidInput(_))
        ));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let engine = ScriptedEngine::new()
            .step(ScriptedStep::visit("https://slow.example").delay(Duration::from_secs(30)));
        let config = TaskServiceConfig {
            max_concurrent: 1,
            ..TaskServiceConfig::default()
        };
        let service = TaskService::new(Arc::new(engine), config);

        let first = service.create(RunTaskRequest::new("one")).await.unwrap();
        let err = service.create(RunTaskRequest::new("two")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(service.store().len(), 1);

        service.stop(&first.to_string()).unwrap();
        wait_for_status(service.store(), &first, TaskStatus::Stopped).await;
    }

    #[tokio::test]
    async fn test_public_share_and_uploads() {
        let service = service(ScriptedEngine::echo());
        let mut request = RunTaskRequest::new("summarize the attachment");
        request.settings.enable_public_share = true;
        request.settings.included_file_names = vec!["brief.pdf".to_string()];

        let id = service.create(request).await.unwrap();
        let record = service.get(&id.to_string()).unwrap();
        assert_eq!(record.public_share_url, Some(format!("/share/{}", id)));
        assert_eq!(record.user_uploaded_files, vec!["brief.pdf"]);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let service = service(ScriptedEngine::echo());
        let unknown = TaskId::new().to_string();

        for id in [unknown.as_str(), "not-a-uuid"] {
            assert!(service.get(id).unwrap_err().is_not_found(Resource::Task));
            assert!(service.status(id).unwrap_err().is_not_found(Resource::Task));
            assert!(service.pause(id).unwrap_err().is_not_found(Resource::Task));
            assert!(service.resume(id).unwrap_err().is_not_found(Resource::Task));
            assert!(service.stop(id).unwrap_err().is_not_found(Resource::Task));
            assert!(service.gif(id).unwrap_err().is_not_found(Resource::Task));
            assert!(service.delete(id).unwrap_err().is_not_found(Resource::Task));
        }
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn test_delete_refused_while_running() {
        let engine = ScriptedEngine::new()
            .step(ScriptedStep::visit("https://slow.example").delay(Duration::from_secs(30)));
        let service = service(engine);
        let id = service.create(RunTaskRequest::new("slow")).await.unwrap();
        let key = id.to_string();

        let err = service.delete(&key).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { operation: "delete", .. }));

        service.stop(&key).unwrap();
        service.delete(&key).unwrap();
        assert!(service.get(&key).unwrap_err().is_not_found(Resource::Task));
    }
}
