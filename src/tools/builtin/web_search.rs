//! Web search through an online-search model.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use crate::agent::AgentContext;
use crate::content::ContentBuffer;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, ModelChunk};
use crate::tools::tool::{ParamType, Tool, ToolArgs, ToolError, ToolParam};

pub const WEB_SEARCH_TOOL: &str = "web_search";

const SEARCH_SYSTEM_PROMPT: &str =
    "Answer the query using current information from the web. Be concise and cite sources.";

/// Streams a search model's answer for `query` into the turn.
///
/// Only available when a search provider is configured.
pub struct WebSearchTool {
    provider: Option<Arc<dyn LlmProvider>>,
}

impl WebSearchTool {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        WEB_SEARCH_TOOL
    }

    fn description(&self) -> &str {
        "Searching the web"
    }

    fn icon(&self) -> &str {
        "web"
    }

    fn instructions(&self) -> &str {
        "Search the web for information. *ONLY* use this tool if you need up-to-date information."
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required(
            "query",
            ParamType::String,
            "What to search for",
        )]
    }

    fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    async fn execute(
        &self,
        ctx: &mut AgentContext,
        output: &ContentBuffer,
        args: ToolArgs,
    ) -> Result<Value, ToolError> {
        let query = args.require_str("query")?.to_string();
        let provider = self.provider.as_ref().ok_or_else(|| ToolError::Unavailable {
            name: WEB_SEARCH_TOOL.to_string(),
        })?;
        let failed = |reason: String| ToolError::ExecutionFailed {
            name: WEB_SEARCH_TOOL.to_string(),
            reason,
        };

        ctx.observe(format!(
            "Searching the web for information using the query: {}",
            query
        ));

        let request = CompletionRequest::new(vec![
            ChatMessage::system(SEARCH_SYSTEM_PROMPT),
            ChatMessage::user(query.as_str()),
        ]);
        let mut stream = provider
            .stream(request)
            .await
            .map_err(|e| failed(e.to_string()))?;

        let mut results = String::new();
        let mut citations = Vec::new();
        while let Some(item) = stream.next().await {
            match item.map_err(|e| failed(e.to_string()))? {
                ModelChunk::Text(text) => {
                    results.push_str(&text);
                    output.append_text(text);
                }
                ModelChunk::Completion(metadata) => citations = metadata.citations,
            }
        }
        tracing::debug!(
            query = %query,
            chars = results.len(),
            sources = citations.len(),
            "Web search finished"
        );

        ctx.observe(format!("Search results: {}", results));
        if !citations.is_empty() {
            output.append_text(render_sources(&citations));
            ctx.observe(format!("Sources: {}", citations.join(", ")));
        }
        Ok(Value::Null)
    }
}

/// Numbered source list matching the `[n]` markers search models emit.
fn render_sources(citations: &[String]) -> String {
    let mut rendered = String::from("\n\nSources:");
    for (i, url) in citations.iter().enumerate() {
        rendered.push_str(&format!("\n[{}] {} ({})", i + 1, source_domain(url), url));
    }
    rendered
}

/// Host of `url` without a leading `www.`, or the url itself if unparsable.
fn source_domain(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .map(|host| host.trim_start_matches("www.").to_string())
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Chunk;
    use crate::llm::{FinishReason, LanguageModels, ScriptStep, ScriptedProvider};
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn context() -> AgentContext {
        AgentContext::new(
            "latest rust release?",
            ContentBuffer::new(),
            LanguageModels::new(Arc::new(ScriptedProvider::new("core"))),
            Arc::new(ToolRegistry::new()),
        )
    }

    fn args(query: &str) -> ToolArgs {
        let tool = WebSearchTool::new(None);
        ToolArgs::validate(
            WEB_SEARCH_TOOL,
            &tool.params(),
            json!({ "query": query }).as_object().cloned().unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_availability_follows_provider() {
        assert!(!WebSearchTool::new(None).is_available());
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::new("sonar"));
        assert!(WebSearchTool::new(Some(provider)).is_available());
        assert_eq!(WebSearchTool::new(None).icon(), "web");
    }

    #[tokio::test]
    async fn test_streams_results_and_observes() {
        let search = Arc::new(ScriptedProvider::new("sonar").with_text(&["Rust 1.90", " is out"]));
        let tool = WebSearchTool::new(Some(search.clone()));
        let mut ctx = context();
        let output = ctx.content().clone();

        let result = tool.execute(&mut ctx, &output, args("rust release")).await.unwrap();

        assert_eq!(result, Value::Null);
        assert_eq!(
            output.snapshot().chunks(),
            &[Chunk::text("Rust 1.90"), Chunk::text(" is out")]
        );
        let notes: Vec<&str> = ctx.observations().iter().map(|o| o.note.as_str()).collect();
        assert_eq!(
            notes,
            vec![
                "Searching the web for information using the query: rust release",
                "Search results: Rust 1.90 is out",
            ]
        );
        assert_eq!(search.requests()[0].messages[1].content, "rust release");
    }

    #[tokio::test]
    async fn test_citations_are_appended_and_observed() {
        let search = Arc::new(ScriptedProvider::new("sonar").with_response(vec![
            ScriptStep::Text("Rust 1.90 is out [1].".into()),
            ScriptStep::Cite("https://www.rust-lang.org/news".into()),
            ScriptStep::Cite("not a url".into()),
            ScriptStep::Finish(FinishReason::Stop),
        ]));
        let tool = WebSearchTool::new(Some(search));
        let mut ctx = context();
        let output = ctx.content().clone();

        tool.execute(&mut ctx, &output, args("rust release")).await.unwrap();

        assert_eq!(
            output.snapshot().chunks(),
            &[
                Chunk::text("Rust 1.90 is out [1]."),
                Chunk::text(
                    "\n\nSources:\n[1] rust-lang.org (https://www.rust-lang.org/news)\n[2] not a url (not a url)"
                ),
            ]
        );
        assert_eq!(
            ctx.observations().last().map(|o| o.note.as_str()),
            Some("Sources: https://www.rust-lang.org/news, not a url")
        );
    }

    #[test]
    fn test_source_domain_strips_www() {
        assert_eq!(source_domain("https://www.example.com/a?b=1"), "example.com");
        assert_eq!(source_domain("http://docs.rs/tokio"), "docs.rs");
        assert_eq!(source_domain("relative/path"), "relative/path");
    }

    #[tokio::test]
    async fn test_stream_failure_is_execution_error() {
        let search = Arc::new(ScriptedProvider::new("sonar").with_response(vec![
            ScriptStep::Text("half".into()),
            ScriptStep::Fail("reset".into()),
        ]));
        let tool = WebSearchTool::new(Some(search));
        let mut ctx = context();
        let output = ctx.content().clone();

        let err = tool.execute(&mut ctx, &output, args("x")).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert_eq!(output.text(), "half");
    }

    #[tokio::test]
    async fn test_unconfigured_tool_refuses() {
        let tool = WebSearchTool::new(None);
        let mut ctx = context();
        let output = ctx.content().clone();
        let err = tool.execute(&mut ctx, &output, args("x")).await.unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { .. }));
    }
}
