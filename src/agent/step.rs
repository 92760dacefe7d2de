//! Classified outcome of one routed model round.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Details of a tool invocation chosen by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallStep {
    pub tool_name: String,
    pub args: Map<String, Value>,
    pub rationale: String,
    /// What the tool returned (`Null` if nothing).
    pub return_value: Value,
}

/// Result of [`AgentContext::stream_step`](crate::agent::AgentContext::stream_step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// No tool was needed; the agent should stream its own answer.
    Default,
    /// A tool ran and already appended its output.
    ToolCall(ToolCallStep),
    /// The model call failed; the turn should end.
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Default,
    ToolCall,
    Error,
}

impl Step {
    pub fn kind(&self) -> StepKind {
        match self {
            Step::Default => StepKind::Default,
            Step::ToolCall(_) => StepKind::ToolCall,
            Step::Error { .. } => StepKind::Error,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Step::ToolCall(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Step::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_serializes_with_type_tag() {
        let step = Step::Error {
            message: "boom".into(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "boom");

        let json = serde_json::to_value(Step::Default).unwrap();
        assert_eq!(json["type"], "default");
    }

    #[test]
    fn test_kind() {
        let step = Step::ToolCall(ToolCallStep {
            tool_name: "web_search".into(),
            args: Map::new(),
            rationale: String::new(),
            return_value: Value::Null,
        });
        assert_eq!(step.kind(), StepKind::ToolCall);
        assert!(step.is_tool_call());
        assert!(!step.is_error());
    }
}
