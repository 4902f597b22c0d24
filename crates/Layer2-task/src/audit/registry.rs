//! Agent registry
//!
//! Agents and their numbered configuration versions. Versions are immutable once
//! created; a new version gets `max + 1` and becomes current. Executions pin the
//! version they started with, so later versions never change them.

use agentpod_foundation::{Error, Resource, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AgentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(AgentId)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    /// Default task text when an execution has no input of its own
    pub task_prompt: String,
    pub is_active: bool,
    pub current_config_version: u32,
    pub created_at: DateTime<Utc>,
}

/// Configuration content of one version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewAgentConfig {
    pub llm_model: Option<String>,
    pub llm_config: Map<String, Value>,
    pub browser_settings: Map<String, Value>,
    pub agent_settings: Map<String, Value>,
}

/// Immutable configuration snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfigVersion {
    pub agent_id: AgentId,
    pub version: u32,
    pub llm_model: Option<String>,
    pub llm_config: Map<String, Value>,
    pub browser_settings: Map<String, Value>,
    pub agent_settings: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl AgentConfigVersion {
    fn new(agent_id: AgentId, version: u32, config: NewAgentConfig) -> Self {
        Self {
            agent_id,
            version,
            llm_model: config.llm_model,
            llm_config: config.llm_config,
            browser_settings: config.browser_settings,
            agent_settings: config.agent_settings,
            created_at: Utc::now(),
        }
    }
}

struct AgentEntry {
    agent: Agent,
    versions: Vec<AgentConfigVersion>,
}

impl AgentEntry {
    fn version(&self, version: u32) -> Option<&AgentConfigVersion> {
        self.versions.iter().find(|v| v.version == version)
    }
}

#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<AgentId, AgentEntry>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active agent with configuration version 1
    pub fn create_agent(
        &self,
        name: impl Into<String>,
        task_prompt: impl Into<String>,
        config: NewAgentConfig,
    ) -> Agent {
        let id = AgentId::new();
        let agent = Agent {
            id,
            name: name.into(),
            task_prompt: task_prompt.into(),
            is_active: true,
            current_config_version: 1,
            created_at: Utc::now(),
        };

        self.agents.write().insert(
            id,
            AgentEntry {
                agent: agent.clone(),
                versions: vec![AgentConfigVersion::new(id, 1, config)],
            },
        );
        info!("Agent {} ({}) created", agent.name, id);
        agent
    }

    pub fn get_agent(&self, id: &AgentId) -> Result<Agent> {
        self.agents
            .read()
            .get(id)
            .map(|e| e.agent.clone())
            .ok_or_else(|| Error::not_found(Resource::Agent, id))
    }

    /// Agents newest first
    pub fn list_agents(&self, skip: usize, limit: usize) -> Vec<Agent> {
        let agents = self.agents.read();
        let mut listed: Vec<&Agent> = agents.values().map(|e| &e.agent).collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.into_iter().skip(skip).take(limit).cloned().collect()
    }

    pub fn set_active(&self, id: &AgentId, active: bool) -> Result<()> {
        let mut agents = self.agents.write();
        let entry = agents
            .get_mut(id)
            .ok_or_else(|| Error::not_found(Resource::Agent, id))?;
        entry.agent.is_active = active;
        Ok(())
    }

    /// Add a version numbered `max + 1` and make it current
    pub fn create_version(&self, id: &AgentId, config: NewAgentConfig) -> Result<AgentConfigVersion> {
        let mut agents = self.agents.write();
        let entry = agents
            .get_mut(id)
            .ok_or_else(|| Error::not_found(Resource::Agent, id))?;

        let next = entry.versions.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        let version = AgentConfigVersion::new(*id, next, config);
        entry.versions.push(version.clone());
        entry.agent.current_config_version = next;

        info!("Agent {} configuration version {} created", id, next);
        Ok(version)
    }

    /// Switch the current version to an existing one
    pub fn activate(&self, id: &AgentId, version: u32) -> Result<()> {
        let mut agents = self.agents.write();
        let entry = agents
            .get_mut(id)
            .ok_or_else(|| Error::not_found(Resource::Agent, id))?;

        if entry.version(version).is_none() {
            return Err(Error::not_found(
                Resource::Configuration,
                format!("{} v{}", id, version),
            ));
        }
        entry.agent.current_config_version = version;
        info!("Agent {} now uses configuration version {}", id, version);
        Ok(())
    }

    pub fn get_version(&self, id: &AgentId, version: u32) -> Result<AgentConfigVersion> {
        let agents = self.agents.read();
        let entry = agents
            .get(id)
            .ok_or_else(|| Error::not_found(Resource::Agent, id))?;
        entry
            .version(version)
            .cloned()
            .ok_or_else(|| Error::not_found(Resource::Configuration, format!("{} v{}", id, version)))
    }

    /// The agent together with its current configuration
    pub fn current_config(&self, id: &AgentId) -> Result<(Agent, AgentConfigVersion)> {
        let agents = self.agents.read();
        let entry = agents
            .get(id)
            .ok_or_else(|| Error::not_found(Resource::Agent, id))?;
        let version = entry
            .version(entry.agent.current_config_version)
            .cloned()
            .ok_or_else(|| {
                Error::not_found(
                    Resource::Configuration,
                    format!("{} v{}", id, entry.agent.current_config_version),
                )
            })?;
        Ok((entry.agent.clone(), version))
    }

    /// Versions newest first
    pub fn list_versions(&self, id: &AgentId) -> Result<Vec<AgentConfigVersion>> {
        let agents = self.agents.read();
        let entry = agents
            .get(id)
            .ok_or_else(|| Error::not_found(Resource::Agent, id))?;
        let mut versions = entry.versions.clone();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }
}
