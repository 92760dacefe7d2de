//! Agent trait and the registry of named agents.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::AgentContext;
use crate::error::AgentError;
use crate::tools::ToolRegistry;

/// Name reserved for the fallback agent; never listed for mentions.
pub const DEFAULT_AGENT_NAME: &str = "default";

/// A procedure that drives one turn through an [`AgentContext`].
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Tools that must be registered and available for the agent to be listed.
    fn required_tools(&self) -> &[&str] {
        &[]
    }

    async fn run(&self, ctx: &mut AgentContext) -> Result<(), AgentError>;
}

/// Registry of agents by name.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. A later registration under the same name wins.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        if self.agents.insert(name.clone(), agent).is_some() {
            tracing::info!(agent = %name, "Overriding existing agent registration");
        } else {
            tracing::debug!("Registered agent: {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Agent>, AgentError> {
        self.maybe_get(name).ok_or_else(|| AgentError::NotFound {
            name: name.to_string(),
        })
    }

    pub fn maybe_get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Agents a user can address by name, sorted.
    ///
    /// Excludes the fallback agent and agents whose required tools are
    /// missing or unavailable.
    pub async fn named_agents(&self, tools: &ToolRegistry) -> Vec<Arc<dyn Agent>> {
        let mut named = Vec::new();
        for (name, agent) in &self.agents {
            if name == DEFAULT_AGENT_NAME {
                continue;
            }
            if !tools.all_available(agent.required_tools()).await {
                tracing::debug!(agent = %name, "Hiding agent with unavailable tools");
                continue;
            }
            named.push(Arc::clone(agent));
        }
        named.sort_by(|a, b| a.name().cmp(b.name()));
        named
    }
}
