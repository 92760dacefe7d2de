//! Per-turn context handed to agents.
//!
//! [`AgentContext`] sits between agent code and the model providers. Agents
//! call one of three streaming helpers:
//!
//! - [`AgentContext::stream_to_content`] appends every text increment to the
//!   turn's content.
//! - [`AgentContext::stream_step`] asks the router model whether a tool is
//!   needed, runs it if so, and reports what happened as a [`Step`].
//! - [`AgentContext::stream_chunks`] hands raw increments back to the caller.
//!
//! Model failures never surface as `Err` from these helpers. They are recorded
//! on the content (and returned as [`Step::Error`] from `stream_step`) so an
//! agent can end its turn cleanly.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::{Map, Value};

use crate::agent::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::agent::step::{Step, ToolCallStep};
use crate::content::{Chunk, ContentBuffer, TurnEvent};
use crate::error::{AgentError, ToolError};
use crate::llm::{
    ChatMessage, CompletionMetadata, CompletionRequest, FinishReason, LanguageModels, ModelChunk,
    ModelType,
};
use crate::tools::router::{parse_tool_selection, tool_use_prompt};
use crate::tools::{Tool, ToolArgs, ToolRegistry};

pub const MAX_TOKENS_MESSAGE: &str =
    "Max tokens reached. Output may be truncated. Please try with another model.";

const ROUTER_STATUS: &str = "Thinking about what to do next...";

/// A raw increment from [`AgentContext::stream_chunks`].
#[derive(Debug, Clone, PartialEq)]
pub enum AgentChunk {
    Text(String),
    /// The model call failed or was cut short.
    Error(String),
}

/// Options for a single model call.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    system_prompt: Option<String>,
    model_type: ModelType,
    input: Option<String>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    /// Replace the user message (observations and turn input) with `input`.
    pub fn input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// A note the agent recorded about the turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub note: String,
    pub metadata: HashMap<String, String>,
}

/// Per-turn state and streaming helpers.
pub struct AgentContext {
    input: String,
    history: Vec<ChatMessage>,
    base_prompt: String,
    content: ContentBuffer,
    models: LanguageModels,
    registry: Arc<ToolRegistry>,
    tools: Vec<Arc<dyn Tool>>,
    tool_uses: HashMap<String, usize>,
    observations: Vec<Observation>,
    max_tokens: Option<u32>,
}

impl AgentContext {
    pub fn new(
        input: impl Into<String>,
        content: ContentBuffer,
        models: LanguageModels,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            input: input.into(),
            history: Vec::new(),
            base_prompt: String::new(),
            content,
            models,
            registry,
            tools: Vec::new(),
            tool_uses: HashMap::new(),
            observations: Vec::new(),
            max_tokens: None,
        }
    }

    /// Prior conversation, oldest first.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Prompt prepended to every system prompt.
    pub fn with_base_prompt(mut self, base_prompt: impl Into<String>) -> Self {
        self.base_prompt = base_prompt.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn content(&self) -> &ContentBuffer {
        &self.content
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// How many times `tool` has been used this turn.
    pub fn tool_uses(&self, tool: &str) -> usize {
        self.tool_uses.get(tool).copied().unwrap_or(0)
    }

    /// Record a note about the turn. Notes are fed to later model calls.
    pub fn observe(&mut self, note: impl Into<String>) {
        self.observe_with(note, HashMap::new());
    }

    pub fn observe_with(&mut self, note: impl Into<String>, metadata: HashMap<String, String>) {
        let note = note.into();
        tracing::debug!(note = %note, "Observed");
        self.content.notify(TurnEvent::Observed { note: note.clone() });
        self.observations.push(Observation { note, metadata });
    }

    /// Observations followed by the turn input.
    pub fn prompt(&self) -> String {
        let mut prompt = self
            .observations
            .iter()
            .map(|o| o.note.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(&self.input);
        prompt
    }

    fn build_request(&self, options: &StreamOptions) -> CompletionRequest {
        let system_prompt = options.system_prompt.as_deref().unwrap_or("");
        let system = match (self.base_prompt.is_empty(), system_prompt.is_empty()) {
            (true, _) => system_prompt.to_string(),
            (false, true) => self.base_prompt.clone(),
            (false, false) => format!("{}\n\n{}", self.base_prompt, system_prompt),
        };

        let mut messages = Vec::with_capacity(self.history.len() + 2);
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(
            options.input.clone().unwrap_or_else(|| self.prompt()),
        ));

        CompletionRequest {
            messages,
            max_tokens: self.max_tokens,
        }
    }

    /// Stream raw increments from one model call without touching the content.
    ///
    /// Call metadata is still recorded on the turn. A failed call ends the
    /// stream with a single [`AgentChunk::Error`].
    pub fn stream_chunks(&self, options: StreamOptions) -> BoxStream<'static, AgentChunk> {
        let provider = self.models.get(options.model_type);
        let request = self.build_request(&options);
        let content = self.content.clone();

        let stream = async_stream::stream! {
            let model_id = provider.model_id();
            let call = content.begin_call(&model_id);
            tracing::debug!(model = %model_id, "Model call started");

            let mut model_stream = match provider.stream(request).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::warn!(model = %model_id, error = %e, "Model call failed");
                    content.finish_call(call, &CompletionMetadata {
                        finish_reason: FinishReason::Other,
                        ..Default::default()
                    });
                    yield AgentChunk::Error(e.to_string());
                    return;
                }
            };

            let mut completed = false;
            while let Some(item) = model_stream.next().await {
                match item {
                    Ok(ModelChunk::Text(text)) => {
                        if !text.is_empty() {
                            yield AgentChunk::Text(text);
                        }
                    }
                    Ok(ModelChunk::Completion(metadata)) => {
                        completed = true;
                        content.finish_call(call, &metadata);
                        tracing::debug!(
                            model = %model_id,
                            output_tokens = metadata.output_tokens,
                            "Model call finished"
                        );
                        if metadata.finish_reason == FinishReason::MaxTokens {
                            yield AgentChunk::Error(MAX_TOKENS_MESSAGE.to_string());
                        }
                    }
                    Err(e) => {
                        tracing::warn!(model = %model_id, error = %e, "Model stream failed");
                        content.finish_call(call, &CompletionMetadata {
                            finish_reason: FinishReason::Other,
                            ..Default::default()
                        });
                        yield AgentChunk::Error(e.to_string());
                        return;
                    }
                }
            }

            if !completed {
                tracing::warn!(model = %model_id, "Model stream ended without completion metadata");
                content.finish_call(call, &CompletionMetadata::default());
            }
        };

        stream.boxed()
    }

    /// Stream one model call into the turn's content.
    ///
    /// Uses the default system prompt unless one is given. Returns the number
    /// of chunks appended; errors are recorded on the content.
    pub async fn stream_to_content(&self, options: StreamOptions) -> usize {
        let options = if options.system_prompt.is_none() {
            options.system_prompt(DEFAULT_SYSTEM_PROMPT)
        } else {
            options
        };

        let mut appended = 0;
        let mut chunks = self.stream_chunks(options);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                AgentChunk::Text(text) => {
                    self.content.append_text(text);
                    appended += 1;
                }
                AgentChunk::Error(message) => self.content.record_error(message),
            }
        }
        appended
    }

    /// Ask the router model whether a tool should run, and run it.
    ///
    /// `tools` replaces the tool set offered this turn (and resets use
    /// counts); `None` keeps the current set. Tools that are unavailable or
    /// used up are not offered.
    ///
    /// Returns `Err` only when the chosen tool itself fails.
    pub async fn stream_step(&mut self, tools: Option<&[&str]>) -> Result<Step, AgentError> {
        if let Some(names) = tools {
            self.set_tools(names).await;
        }

        let available = self.available_tools();
        let system_prompt = tool_use_prompt(&available);
        self.content.notify(TurnEvent::Status {
            message: ROUTER_STATUS.to_string(),
        });

        let mut response = String::new();
        let mut chunks = self.stream_chunks(
            StreamOptions::new()
                .system_prompt(system_prompt)
                .model_type(ModelType::Router),
        );
        while let Some(chunk) = chunks.next().await {
            match chunk {
                AgentChunk::Text(text) => response.push_str(&text),
                AgentChunk::Error(message) => {
                    self.content.record_error(message.clone());
                    return Ok(Step::Error { message });
                }
            }
        }
        tracing::debug!(response = %response, "Router response");

        let selection = parse_tool_selection(&response);
        let Some(tool_name) = selection.tool else {
            return Ok(Step::Default);
        };

        let Some(tool) = self.tools.iter().find(|t| t.name() == tool_name).cloned() else {
            let message = ToolError::NotFound { name: tool_name }.to_string();
            tracing::warn!("{}", message);
            self.content.record_error(message.clone());
            return Ok(Step::Error { message });
        };

        let args = match self.prepare_tool(tool.as_ref(), selection.args.clone(), true) {
            Ok(args) => args,
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(tool = %tool_name, error = %message, "Router picked an unusable tool");
                self.content.record_error(message.clone());
                return Ok(Step::Error { message });
            }
        };

        // Once the tool has started, any failure belongs to the agent.
        let return_value = self.run_tool(tool, args).await?;
        Ok(Step::ToolCall(ToolCallStep {
            tool_name,
            args: selection.args,
            rationale: selection.rationale,
            return_value,
        }))
    }

    /// Invoke a registered tool directly, bypassing availability checks.
    ///
    /// Arguments are still validated against the tool's parameters.
    pub async fn call_tool(
        &mut self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<Value, ToolError> {
        let tool = match self.tools.iter().find(|t| t.name() == name) {
            Some(tool) => Arc::clone(tool),
            None => self
                .registry
                .get(name)
                .await
                .ok_or_else(|| ToolError::NotFound {
                    name: name.to_string(),
                })?,
        };
        let args = self.prepare_tool(tool.as_ref(), args, false)?;
        self.run_tool(tool, args).await
    }

    async fn set_tools(&mut self, names: &[&str]) {
        let mut tools = Vec::with_capacity(names.len());
        for name in names {
            match self.registry.get(name).await {
                Some(tool) => tools.push(tool),
                None => tracing::warn!(tool = %name, "Requested tool is not registered"),
            }
        }
        self.tool_uses = tools.iter().map(|t| (t.name().to_string(), 0)).collect();
        self.tools = tools;
    }

    fn is_available(&self, tool: &dyn Tool) -> bool {
        self.tool_uses(tool.name()) < tool.max_uses() && tool.is_available()
    }

    fn available_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .filter(|t| self.is_available(t.as_ref()))
            .cloned()
            .collect()
    }

    /// Checks that run before a tool touches the content.
    fn prepare_tool(
        &self,
        tool: &dyn Tool,
        args: Map<String, Value>,
        check_available: bool,
    ) -> Result<ToolArgs, ToolError> {
        if check_available && !self.is_available(tool) {
            return Err(ToolError::Unavailable {
                name: tool.name().to_string(),
            });
        }
        ToolArgs::validate(tool.name(), &tool.params(), args)
    }

    async fn run_tool(&mut self, tool: Arc<dyn Tool>, args: ToolArgs) -> Result<Value, ToolError> {
        let name = tool.name().to_string();
        self.observe(format!("OK, I'm using this tool: {}", name));
        *self.tool_uses.entry(name.clone()).or_insert(0) += 1;
        self.content
            .append_chunk(Chunk::tool_call(&name, args.as_map().clone()));

        tracing::info!(tool = %name, "Running tool");
        let output = self.content.clone();
        let result = tool.execute(self, &output, args).await?;

        self.observe(format!("OK I'm done using the tool: {}", name));
        if !result.is_null() {
            self.observe("Here is the result of using the tool:");
            self.observe(result.to_string());
        }
        Ok(result)
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("input", &self.input)
            .field("history", &self.history.len())
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("observations", &self.observations.len())
            .finish()
    }
}
