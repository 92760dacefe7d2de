//! Streaming provider for OpenAI-compatible `/chat/completions` endpoints.
//!
//! Works against OpenAI itself and any service that speaks the same wire
//! format (Perplexity, local gateways).

use async_trait::async_trait;
use futures::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{
    CompletionMetadata, CompletionRequest, FinishReason, LlmProvider, ModelChunk, ModelStream,
};
use crate::error::LlmError;

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes may split anywhere, including inside a UTF-8 sequence; only
/// complete `data:` lines are decoded and returned.
#[derive(Debug)]
pub(crate) struct SseDecoder {
    provider: String,
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            buffer: Vec::new(),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, LlmError> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = self.payload(&line)? {
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }

    /// Flush a final event that had no trailing newline.
    pub fn finish(&mut self) -> Result<Vec<String>, LlmError> {
        let rest = std::mem::take(&mut self.buffer);
        Ok(self.payload(&rest)?.into_iter().collect())
    }

    fn payload(&self, line: &[u8]) -> Result<Option<String>, LlmError> {
        let line = std::str::from_utf8(line).map_err(|e| LlmError::InvalidResponse {
            provider: self.provider.clone(),
            reason: format!("stream line is not valid UTF-8: {}", e),
        })?;
        Ok(line
            .trim()
            .strip_prefix("data:")
            .map(|payload| payload.trim().to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
    /// Source URLs, sent by search providers such as Perplexity.
    #[serde(default)]
    citations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: u32,
}

/// Accumulates finish and usage info across the events of one stream.
#[derive(Debug, Default)]
struct StreamState {
    metadata: CompletionMetadata,
    done: bool,
}

impl StreamState {
    /// Apply one SSE payload, returning a text delta if it carried one.
    fn apply(&mut self, provider: &str, payload: &str) -> Result<Option<String>, LlmError> {
        if payload == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: StreamChunk =
            serde_json::from_str(payload).map_err(|e| LlmError::InvalidResponse {
                provider: provider.to_string(),
                reason: format!("malformed stream event: {}", e),
            })?;

        if let Some(usage) = chunk.usage {
            self.metadata.input_tokens = usage.prompt_tokens;
            self.metadata.output_tokens = usage.completion_tokens;
            self.metadata.cached_input_tokens = usage
                .prompt_tokens_details
                .map(|d| d.cached_tokens)
                .unwrap_or(0);
        }

        for url in chunk.citations {
            if !self.metadata.citations.contains(&url) {
                self.metadata.citations.push(url);
            }
        }

        let mut text = String::new();
        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.metadata.finish_reason = FinishReason::from_provider(&reason);
            }
            if let Some(delta) = choice.delta.content {
                text.push_str(&delta);
            }
        }

        Ok((!text.is_empty()).then_some(text))
    }
}

/// Provider speaking the OpenAI chat completions streaming protocol.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    provider: String,
    base_url: String,
    api_key: SecretString,
    model: String,
    max_tokens: u32,
}

impl OpenAiCompatProvider {
    pub fn new(
        provider: impl Into<String>,
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            provider: provider.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            max_tokens,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ModelStream, LlmError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "max_tokens": request.max_tokens.unwrap_or(self.max_tokens),
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        tracing::debug!(
            provider = %self.provider,
            model = %self.model,
            messages = request.messages.len(),
            "Starting streaming completion"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.provider.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(LlmError::AuthFailed {
                provider: self.provider.clone(),
            });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: self.provider.clone(),
                reason: format!("HTTP {}: {}", status, error_text),
            });
        }

        let provider = self.provider.clone();
        let mut bytes = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new(provider.as_str());
            let mut state = StreamState::default();

            loop {
                let payloads = match bytes.next().await {
                    Some(Ok(chunk)) => decoder.push(&chunk),
                    Some(Err(e)) => Err(LlmError::Http(e)),
                    None => break,
                };
                let payloads = match payloads {
                    Ok(payloads) => payloads,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };
                for payload in payloads {
                    match state.apply(&provider, &payload) {
                        Ok(Some(text)) => yield Ok(ModelChunk::Text(text)),
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            let payloads = match decoder.finish() {
                Ok(payloads) => payloads,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };
            for payload in payloads {
                match state.apply(&provider, &payload) {
                    Ok(Some(text)) => yield Ok(ModelChunk::Text(text)),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            if !state.done {
                tracing::debug!(provider = %provider, "Stream ended without [DONE] marker");
            }
            yield Ok(ModelChunk::Completion(state.metadata));
        };

        Ok(Box::pin(stream))
    }
}
