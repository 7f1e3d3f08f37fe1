//! Agent discovery and instantiation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use strandex_core::{Agent, Error, ToolRegistry};

use crate::config::AgentConfig;
use crate::research_summarizer::{self, ResearchSummarizerAgent};

/// Builds an agent from its loaded configuration and the available tools.
pub type AgentFactory =
    Arc<dyn Fn(AgentConfig, &ToolRegistry) -> Result<Box<dyn Agent>, Error> + Send + Sync>;

/// Agents compiled into this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAgent {
    ResearchSummarizer,
}

impl BuiltinAgent {
    pub fn all() -> Vec<Self> {
        vec![Self::ResearchSummarizer]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ResearchSummarizer => research_summarizer::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all().into_iter().find(|agent| agent.name() == name)
    }

    /// The `config.json` compiled into the binary for this agent.
    pub fn shipped_config(&self) -> &'static str {
        match self {
            Self::ResearchSummarizer => {
                include_str!("../agents/research_summarizer/config.json")
            }
        }
    }

    pub fn create(
        &self,
        config: AgentConfig,
        tools: &ToolRegistry,
    ) -> Result<Box<dyn Agent>, Error> {
        match self {
            Self::ResearchSummarizer => Ok(Box::new(ResearchSummarizerAgent::new(config, tools)?)),
        }
    }
}

/// Information about an available agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    /// `None` when the agent has no config file or the file has no description.
    pub description: Option<String>,
}

/// Maps agent names to factories. Per-agent configuration lives in
/// `<agents_dir>/<name>/config.json`; a built-in agent without a directory
/// there uses the configuration compiled into the binary.
pub struct AgentRegistry {
    agents_dir: PathBuf,
    tools: ToolRegistry,
    factories: BTreeMap<String, AgentFactory>,
}

impl AgentRegistry {
    /// Registry with every built-in agent registered.
    pub fn new(agents_dir: impl Into<PathBuf>, tools: ToolRegistry) -> Self {
        let mut registry = Self::empty(agents_dir, tools);
        for builtin in BuiltinAgent::all() {
            registry.register(
                builtin.name(),
                Arc::new(move |config: AgentConfig, tools: &ToolRegistry| {
                    builtin.create(config, tools)
                }),
            );
        }
        registry
    }

    pub fn empty(agents_dir: impl Into<PathBuf>, tools: ToolRegistry) -> Self {
        Self {
            agents_dir: agents_dir.into(),
            tools,
            factories: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, factory: AgentFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn agents_dir(&self) -> &Path {
        &self.agents_dir
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    fn config_for(&self, name: &str) -> AgentConfig {
        let agent_dir = self.agents_dir.join(name);
        if agent_dir.is_dir() {
            return AgentConfig::load(&agent_dir.join("config.json"));
        }

        match BuiltinAgent::from_name(name) {
            Some(builtin) => AgentConfig::from_json(builtin.shipped_config()).unwrap_or_else(|e| {
                warn!(agent = name, error = %e, "Invalid built-in agent config");
                AgentConfig::default()
            }),
            None => AgentConfig::default(),
        }
    }

    /// Registered agents sorted by name. A missing or unreadable config
    /// only leaves the description empty.
    pub fn list(&self) -> Vec<AgentInfo> {
        self.factories
            .keys()
            .map(|name| {
                let config = self.config_for(name);
                let description = Some(config.description).filter(|d| !d.is_empty());
                AgentInfo {
                    name: name.clone(),
                    description,
                }
            })
            .collect()
    }

    /// Instantiate `name` with its configuration.
    pub fn load(&self, name: &str) -> Result<Box<dyn Agent>, Error> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::AgentNotFound(name.to_string()))?;

        let config = self.config_for(name);
        debug!(
            agent = name,
            tools = ?config.tools,
            prompts = config.prompts.len(),
            "Loading agent"
        );
        factory(config, &self.tools)
    }
}

/// User agent directory, `~/.config/strandex/agents` on Linux.
pub fn default_agents_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("strandex")
        .join("agents")
}
