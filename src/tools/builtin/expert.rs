//! General software engineering expert.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;

use crate::agent::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::agent::{AgentChunk, AgentContext, StreamOptions};
use crate::content::ContentBuffer;
use crate::tools::tool::{ParamType, Tool, ToolArgs, ToolError, ToolParam};

pub const SOFTWARE_EXPERT_TOOL: &str = "software_expert";

/// Answers a focused question with the core model, streaming into the turn.
pub struct SoftwareExpertTool;

#[async_trait]
impl Tool for SoftwareExpertTool {
    fn name(&self) -> &str {
        SOFTWARE_EXPERT_TOOL
    }

    fn description(&self) -> &str {
        "General software engineering expert"
    }

    fn icon(&self) -> &str {
        "search"
    }

    fn params(&self) -> Vec<ToolParam> {
        vec![ToolParam::required(
            "question",
            ParamType::String,
            "Self-contained question to answer",
        )]
    }

    async fn execute(
        &self,
        ctx: &mut AgentContext,
        output: &ContentBuffer,
        args: ToolArgs,
    ) -> Result<Value, ToolError> {
        let question = args.require_str("question")?;
        let mut chunks = ctx.stream_chunks(
            StreamOptions::new()
                .system_prompt(DEFAULT_SYSTEM_PROMPT)
                .input(question),
        );
        while let Some(chunk) = chunks.next().await {
            match chunk {
                AgentChunk::Text(text) => {
                    output.append_text(text);
                }
                AgentChunk::Error(message) => output.record_error(message),
            }
        }
        Ok(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LanguageModels, ScriptedProvider};
    use crate::tools::ToolRegistry;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_answers_question_not_turn_input() {
        let core = Arc::new(ScriptedProvider::new("core").with_text(&["Use ", "a Vec"]));
        let registry = Arc::new(ToolRegistry::new());
        registry.register_sync(Arc::new(SoftwareExpertTool));
        let mut ctx = AgentContext::new(
            "help me",
            ContentBuffer::new(),
            LanguageModels::new(core.clone()),
            registry,
        );

        let result = ctx
            .call_tool(
                SOFTWARE_EXPERT_TOOL,
                json!({"question": "array or vec?"}).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(result, Value::Null);
        assert_eq!(ctx.content().text(), "Use a Vec");
        let requests = core.requests();
        let request = &requests[0];
        assert_eq!(request.messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.messages[1].content, "array or vec?");
    }
}
