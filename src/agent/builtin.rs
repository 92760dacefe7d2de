//! Built-in agents.

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::prompts::{CODE_OUTPUT_REQUIREMENTS, HAIKU_PROMPT};
use crate::agent::registry::{Agent, AgentRegistry};
use crate::agent::{AgentContext, Step, StreamOptions};
use crate::error::AgentError;
use crate::llm::ModelType;
use crate::tools::builtin::WEB_SEARCH_TOOL;

/// Streams the whole answer with the default prompt.
pub struct VanillaAgent;

#[async_trait]
impl Agent for VanillaAgent {
    fn name(&self) -> &str {
        "vanilla"
    }

    fn description(&self) -> &str {
        "Answers directly with the core model"
    }

    async fn run(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        ctx.stream_to_content(StreamOptions::new()).await;
        Ok(())
    }
}

/// Like vanilla, but on the reasoner model with code formatting rules.
pub struct ReasonerAgent;

#[async_trait]
impl Agent for ReasonerAgent {
    fn name(&self) -> &str {
        "reasoner"
    }

    fn description(&self) -> &str {
        "Thinks longer using the reasoning model"
    }

    async fn run(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        ctx.stream_to_content(
            StreamOptions::new()
                .system_prompt(CODE_OUTPUT_REQUIREMENTS)
                .model_type(ModelType::Reasoner),
        )
        .await;
        Ok(())
    }
}

/// Lets the router decide whether to search the web before answering.
pub struct SearchAgent;

#[async_trait]
impl Agent for SearchAgent {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Searches the web when it needs fresh information"
    }

    fn required_tools(&self) -> &[&str] {
        &[WEB_SEARCH_TOOL]
    }

    async fn run(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        match ctx.stream_step(Some(&[WEB_SEARCH_TOOL])).await? {
            Step::Error { .. } => {}
            // The tool already wrote its answer
            Step::ToolCall(_) => {}
            Step::Default => {
                ctx.stream_to_content(StreamOptions::new()).await;
            }
        }
        Ok(())
    }
}

/// Streams with a fixed system prompt.
pub struct PromptAgent {
    name: String,
    description: String,
    system_prompt: String,
}

impl PromptAgent {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            system_prompt: system_prompt.into(),
        }
    }

    pub fn haiku() -> Self {
        Self::new("haiku", "Replies with a haiku", HAIKU_PROMPT)
    }
}

#[async_trait]
impl Agent for PromptAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &mut AgentContext) -> Result<(), AgentError> {
        ctx.stream_to_content(StreamOptions::new().system_prompt(self.system_prompt.clone()))
            .await;
        Ok(())
    }
}

/// Registry with every built-in agent.
pub fn builtin_agents() -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(VanillaAgent));
    registry.register(Arc::new(ReasonerAgent));
    registry.register(Arc::new(SearchAgent));
    registry.register(Arc::new(PromptAgent::haiku()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Chunk, ContentBuffer};
    use crate::llm::{LanguageModels, ScriptedProvider};
    use crate::tools::ToolRegistry;

    fn context(models: LanguageModels) -> AgentContext {
        AgentContext::new(
            "write fizzbuzz",
            ContentBuffer::new(),
            models,
            Arc::new(ToolRegistry::new()),
        )
    }

    #[tokio::test]
    async fn test_vanilla_streams_everything() {
        let provider = Arc::new(ScriptedProvider::new("core").with_text(&["Hello", " world"]));
        let mut ctx = context(LanguageModels::new(provider));

        VanillaAgent.run(&mut ctx).await.unwrap();

        assert_eq!(
            ctx.content().snapshot().chunks(),
            &[Chunk::text("Hello"), Chunk::text(" world")]
        );
    }

    #[tokio::test]
    async fn test_reasoner_uses_reasoner_model_and_prompt() {
        let core = Arc::new(ScriptedProvider::new("core"));
        let reasoner = Arc::new(ScriptedProvider::new("deep").with_text(&["fn main() {}"]));
        let models = LanguageModels::new(core.clone()).with(ModelType::Reasoner, reasoner.clone());
        let mut ctx = context(models);

        ReasonerAgent.run(&mut ctx).await.unwrap();

        assert!(core.requests().is_empty());
        assert_eq!(reasoner.requests()[0].messages[0].content, CODE_OUTPUT_REQUIREMENTS);
        assert_eq!(ctx.content().text(), "fn main() {}");
    }

    #[tokio::test]
    async fn test_haiku_agent_uses_its_prompt() {
        let provider = Arc::new(ScriptedProvider::new("core").with_text(&["old pond"]));
        let mut ctx = context(LanguageModels::new(provider.clone()));

        PromptAgent::haiku().run(&mut ctx).await.unwrap();

        assert_eq!(provider.requests()[0].messages[0].content, HAIKU_PROMPT);
    }

    #[test]
    fn test_builtin_agents_registered() {
        let registry = builtin_agents();
        for name in ["vanilla", "reasoner", "search", "haiku"] {
            assert!(registry.has(name), "missing {name}");
        }
        assert_eq!(
            registry.get("search").unwrap().required_tools(),
            &[WEB_SEARCH_TOOL]
        );
    }
}
