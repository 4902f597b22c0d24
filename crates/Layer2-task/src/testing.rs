//! Shared unit test helpers

use crate::engine::EngineRequest;
use crate::settings::TaskSettings;
use crate::state::TaskStatus;
use crate::store::TaskStore;
use crate::task::TaskId;
use agentpod_foundation::BrowserConfig;
use agentpod_provider::ProviderFactory;
use serde_json::json;
use std::time::Duration;

/// Engine request with default settings and the default model
pub(crate) fn request_for(task: &str) -> EngineRequest {
    let llm_config = json!({ "api_key": "sk-test" });
    let llm = ProviderFactory::new()
        .resolve(None, llm_config.as_object().unwrap())
        .unwrap();

    EngineRequest {
        run_id: TaskId::new().to_string(),
        task: task.to_string(),
        settings: TaskSettings::default(),
        llm,
        browser: BrowserConfig::default(),
        step_timeout: Duration::from_secs(60),
    }
}

/// Poll until the record reaches `status`, failing after two seconds
pub(crate) async fn wait_for_status(store: &TaskStore, id: &TaskId, status: TaskStatus) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while store.status(id) != Some(status) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {} never reached {}, is {:?}",
            id,
            status,
            store.status(id)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
