//! Provider that replays pre-configured responses, for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    CompletionMetadata, CompletionRequest, FinishReason, LlmProvider, ModelChunk, ModelStream,
};
use crate::error::LlmError;

/// One event of a scripted response.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Text(String),
    /// Attach a source URL to the completion metadata.
    Cite(String),
    /// End the stream with completion metadata.
    Finish(FinishReason),
    /// Yield a stream error.
    Fail(String),
}

/// A provider that returns queued responses in order.
///
/// Once the queue is empty every call yields an empty, successful stream.
pub struct ScriptedProvider {
    model: String,
    responses: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    start_failure: Option<String>,
}

impl ScriptedProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            start_failure: None,
        }
    }

    /// A provider whose every call fails before streaming starts.
    pub fn failing(model: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            start_failure: Some(reason.into()),
            ..Self::new(model)
        }
    }

    /// Queue a raw response.
    pub fn with_response(self, steps: Vec<ScriptStep>) -> Self {
        self.push_response(steps);
        self
    }

    /// Queue a response streaming `parts` then finishing normally.
    pub fn with_text(self, parts: &[&str]) -> Self {
        let mut steps: Vec<ScriptStep> =
            parts.iter().map(|p| ScriptStep::Text(p.to_string())).collect();
        steps.push(ScriptStep::Finish(FinishReason::Stop));
        self.with_response(steps)
    }

    pub fn push_response(&self, steps: Vec<ScriptStep>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(steps);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ModelStream, LlmError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        if let Some(ref reason) = self.start_failure {
            return Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: reason.clone(),
            });
        }

        let steps = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| vec![ScriptStep::Finish(FinishReason::Stop)]);

        let stream = async_stream::stream! {
            let mut output_tokens = 0;
            let mut citations = Vec::new();
            for step in steps {
                match step {
                    ScriptStep::Text(text) => {
                        output_tokens += 1;
                        yield Ok(ModelChunk::Text(text));
                    }
                    ScriptStep::Cite(url) => citations.push(url),
                    ScriptStep::Finish(finish_reason) => {
                        yield Ok(ModelChunk::Completion(CompletionMetadata {
                            output_tokens,
                            finish_reason,
                            citations: std::mem::take(&mut citations),
                            ..Default::default()
                        }));
                    }
                    ScriptStep::Fail(reason) => {
                        yield Err(LlmError::RequestFailed {
                            provider: "scripted".to_string(),
                            reason,
                        });
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_replays_responses_in_order() {
        let provider = ScriptedProvider::new("m")
            .with_text(&["a", "b"])
            .with_text(&["c"]);

        let first: Vec<_> = provider
            .stream(CompletionRequest::new(vec![ChatMessage::user("1")]))
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(first.len(), 3);
        assert!(matches!(&first[0], Ok(ModelChunk::Text(t)) if t == "a"));

        let second: Vec<_> = provider
            .stream(CompletionRequest::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert!(matches!(&second[0], Ok(ModelChunk::Text(t)) if t == "c"));
        assert_eq!(provider.remaining(), 0);
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.requests()[0].messages[0].content, "1");
    }

    #[tokio::test]
    async fn test_exhausted_provider_returns_empty_completion() {
        let provider = ScriptedProvider::new("m");
        let items: Vec<_> = provider
            .stream(CompletionRequest::default())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Ok(ModelChunk::Completion(_))));
    }

    #[tokio::test]
    async fn test_failing_provider_errors_on_start() {
        let provider = ScriptedProvider::failing("m", "down");
        assert!(provider.stream(CompletionRequest::default()).await.is_err());
        assert_eq!(provider.requests().len(), 1);
    }
}
