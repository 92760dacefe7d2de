//! LLM provider trait and the types that flow through it.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A streaming completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: None,
        }
    }
}

/// Why the model stopped producing output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Other,
    #[default]
    Unknown,
}

impl FinishReason {
    /// Map a provider's raw finish reason string.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "stop" | "end_turn" | "stop_sequence" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::MaxTokens,
            _ => FinishReason::Other,
        }
    }
}

/// Usage and finish information reported once a stream completes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionMetadata {
    pub input_tokens: u32,
    pub cached_input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
    /// Source URLs the model cited, in first-seen order.
    pub citations: Vec<String>,
}

/// One item from a model stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChunk {
    /// A text delta.
    Text(String),
    /// Terminal usage and finish information.
    Completion(CompletionMetadata),
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelChunk, LlmError>> + Send>>;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Short provider name used in logs and errors (e.g. "openai").
    fn provider_name(&self) -> &str;

    /// Get the model name.
    fn model_name(&self) -> &str;

    /// Stable identifier recorded in call metadata.
    fn model_id(&self) -> String {
        format!("{}::{}", self.provider_name(), self.model_name())
    }

    /// Start a streaming completion.
    async fn stream(&self, request: CompletionRequest) -> Result<ModelStream, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reasons_map_from_provider_strings() {
        assert_eq!(FinishReason::from_provider("stop"), FinishReason::Stop);
        assert_eq!(FinishReason::from_provider("length"), FinishReason::MaxTokens);
        assert_eq!(
            FinishReason::from_provider("max_tokens"),
            FinishReason::MaxTokens
        );
        assert_eq!(
            FinishReason::from_provider("content_filter"),
            FinishReason::Other
        );
    }

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("be nice")).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "be nice");
    }
}
