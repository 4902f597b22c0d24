//! Remote engine
//!
//! Posts the task to an automation worker over HTTP and wraps the JSON reply as
//! the result. The worker drives the model, so the resolved LLM travels with the
//! task. The worker runs the whole session in one request and reports no
//! intermediate step boundaries; stop still takes effect at once because the
//! runner drops the in-flight request.

use super::{AutomationEngine, EngineError, EngineHistory, EngineRequest, JsonHistory, StepObserver};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub struct RemoteEngine {
    client: Client,
    endpoint: String,
}

impl RemoteEngine {
    pub fn new(endpoint: impl Into<String>) -> agentpod_foundation::Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| agentpod_foundation::Error::Config(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn body(request: &EngineRequest) -> Value {
        json!({
            "run_id": request.run_id,
            "task": request.task,
            "settings": request.settings,
            "llm": {
                "provider": request.llm.kind(),
                "model": request.llm.model(),
                "base_url": request.llm.base_url(),
                "api_key": request.llm.api_key(),
                "temperature": request.llm.config().temperature,
                "max_tokens": request.llm.config().max_tokens,
            },
            "browser": {
                "headless": request.browser.headless,
                "timeout_ms": request.browser.timeout_ms,
            },
            "step_timeout_secs": request.step_timeout.as_secs(),
        })
    }
}

#[async_trait]
impl AutomationEngine for RemoteEngine {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn run(
        &self,
        request: EngineRequest,
        _observer: &dyn StepObserver,
    ) -> Result<Box<dyn EngineHistory>, EngineError> {
        let url = format!("{}/run", self.endpoint);
        debug!("[{}] posting task to {}", request.run_id, url);

        let response = self
            .client
            .post(&url)
            .json(&Self::body(&request))
            .send()
            .await
            .map_err(|e| EngineError::Fault(format!("remote engine unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[{}] remote engine returned {}", request.run_id, status);
            return Err(EngineError::Fault(format!(
                "remote engine returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| EngineError::Fault(format!("invalid remote engine reply: {}", e)))?;

        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(EngineError::Fault(message.to_string()));
        }

        Ok(Box::new(JsonHistory::new(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CancelOnlyObserver;
    use crate::testing::request_for;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_wraps_reply_as_history() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/run")
            .match_body(mockito::Matcher::PartialJson(json!({
                "task": "check the weather",
                "settings": { "max_agent_steps": 75 },
                "llm": {
                    "provider": "openai",
                    "model": "gpt-4o",
                    "base_url": "https://api.openai.com/v1",
                    "api_key": "sk-test"
                }
            })))
            .with_status(200)
            .with_body(r#"{"final_result":"sunny","urls":["https://weather.example"],"is_done":true}"#)
            .create_async()
            .await;

        let engine = RemoteEngine::new(server.url()).unwrap();
        let observer = CancelOnlyObserver::new(CancellationToken::new());
        let history = engine.run(request_for("check the weather"), &observer).await.unwrap();

        mock.assert_async().await;
        assert_eq!(history.final_result().as_deref(), Some("sunny"));
        assert_eq!(history.is_done(), Some(true));
    }

    #[tokio::test]
    async fn test_error_reply_is_fault() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/run")
            .with_status(502)
            .with_body("browser pool exhausted")
            .create_async()
            .await;

        let engine = RemoteEngine::new(format!("{}/", server.url())).unwrap();
        let observer = CancelOnlyObserver::new(CancellationToken::new());
        let err = engine.run(request_for("x"), &observer).await.err().unwrap();

        assert_eq!(
            err,
            EngineError::Fault("remote engine returned 502: browser pool exhausted".to_string())
        );
    }
}
