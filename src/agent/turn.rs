//! Turn runtime.
//!
//! A [`TurnRunner`] picks the agent for an input, gives it a fresh content
//! buffer and runs it on its own task. The returned [`Turn`] exposes the
//! buffer's events as a stream and lets the caller cancel or await it.

use std::sync::{Arc, LazyLock};

use futures::StreamExt;
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::agent::context::AgentContext;
use crate::agent::registry::AgentRegistry;
use crate::content::{Content, ContentBuffer, ContentView, TurnEvent};
use crate::error::{AgentError, DatabaseError};
use crate::llm::{ChatMessage, LanguageModels, LlmProvider, ModelType};
use crate::store::{Chat, ChatStore};
use crate::tools::ToolRegistry;

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@([\w-]+)\s*").expect("valid regex"));

/// Input for a single turn.
#[derive(Clone, Default)]
pub struct TurnRequest {
    pub input: String,
    pub history: Vec<ChatMessage>,
    /// Replaces the core model for this turn only.
    pub core_model: Option<Arc<dyn LlmProvider>>,
}

impl TurnRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_core_model(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.core_model = Some(provider);
        self
    }
}

/// What a finished (or cancelled) turn produced.
#[derive(Debug)]
pub struct TurnOutcome {
    pub agent: String,
    pub input: String,
    pub content: Content,
    pub result: Result<(), AgentError>,
}

/// A running turn.
pub struct Turn {
    agent: String,
    input: String,
    events: UnboundedReceiverStream<TurnEvent>,
    view: ContentView,
    task: JoinHandle<Result<(), AgentError>>,
}

impl Turn {
    /// Name of the agent handling the turn.
    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Input after mention stripping.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Next event, or `None` once the agent is done.
    pub async fn next_event(&mut self) -> Option<TurnEvent> {
        self.events.next().await
    }

    pub fn content(&self) -> &ContentView {
        &self.view
    }

    /// Abort the agent. Content appended so far is kept.
    pub fn cancel(&self) {
        tracing::info!(agent = %self.agent, "Cancelling turn");
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the agent and collect the content.
    pub async fn finish(self) -> TurnOutcome {
        let result = match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(AgentError::Cancelled),
            Err(e) => Err(AgentError::Panicked(e.to_string())),
        };
        let content = self.view.snapshot();
        tracing::info!(
            agent = %self.agent,
            chunks = content.len(),
            errors = content.errors().len(),
            ok = result.is_ok(),
            "Turn finished"
        );
        TurnOutcome {
            agent: self.agent,
            input: self.input,
            content,
            result,
        }
    }
}

/// Starts turns against a fixed set of agents, tools and models.
pub struct TurnRunner {
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    models: LanguageModels,
    default_agent: String,
    max_tokens: Option<u32>,
    store: Option<Arc<dyn ChatStore>>,
}

impl TurnRunner {
    pub fn new(
        agents: Arc<AgentRegistry>,
        tools: Arc<ToolRegistry>,
        models: LanguageModels,
        default_agent: impl Into<String>,
    ) -> Self {
        Self {
            agents,
            tools,
            models,
            default_agent: default_agent.into(),
            max_tokens: None,
            store: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ChatStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn store(&self) -> Option<&Arc<dyn ChatStore>> {
        self.store.as_ref()
    }

    /// Pick the agent for `input`.
    ///
    /// A leading `@name` naming a registered agent selects it and is removed
    /// from the input. Anything else goes to the default agent untouched.
    pub fn route(&self, input: &str) -> (String, String) {
        if let Some(caps) = MENTION_RE.captures(input) {
            let name = &caps[1];
            if self.agents.has(name) {
                let rest = input[caps.get(0).map_or(0, |m| m.end())..].to_string();
                return (name.to_string(), rest);
            }
            tracing::debug!(mention = %name, "Unknown agent mention, using default");
        }
        (self.default_agent.clone(), input.to_string())
    }

    /// Spawn the agent for `request` and return a handle on the turn.
    pub fn start(&self, request: TurnRequest) -> Result<Turn, AgentError> {
        let (agent_name, input) = self.route(&request.input);
        let agent = self.agents.get(&agent_name)?;

        let models = match request.core_model {
            Some(core) => self.models.clone().with(ModelType::Core, core),
            None => self.models.clone(),
        };

        let (content, events) = ContentBuffer::channel();
        let view = content.view();
        let mut ctx = AgentContext::new(
            input.clone(),
            content.clone(),
            models,
            Arc::clone(&self.tools),
        )
        .with_history(request.history);
        if let Some(max_tokens) = self.max_tokens {
            ctx = ctx.with_max_tokens(max_tokens);
        }

        tracing::info!(agent = %agent_name, "Turn started");
        let name = agent_name.clone();
        let task = tokio::spawn(async move {
            let result = agent.run(&mut ctx).await;
            if let Err(ref e) = result {
                tracing::error!(agent = %name, error = %e, "Agent failed");
                content.record_error(e.to_string());
            }
            result
        });

        Ok(Turn {
            agent: agent_name,
            input,
            events: UnboundedReceiverStream::new(events),
            view,
            task,
        })
    }

    /// Append a finished turn to `chat` and save it when a store is attached.
    pub async fn record(
        &self,
        chat: &mut Chat,
        outcome: &TurnOutcome,
    ) -> Result<(), DatabaseError> {
        chat.push_exchange(outcome.input.clone(), outcome.content.clone());
        if let Some(store) = &self.store {
            store.save_chat(chat).await?;
        }
        Ok(())
    }
}
