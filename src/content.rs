//! Turn content: the append-only chunk buffer agents stream into.
//!
//! A [`ContentBuffer`] is created by whoever sets up a turn and handed to the
//! agent through its context. Agents and tools only ever append to it. Every
//! mutation is also published as a [`TurnEvent`] so a rendering layer can
//! redraw after each suspension point without polling.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::llm::{CompletionMetadata, FinishReason};

/// Minimal unit of streamed output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chunk {
    /// Literal text produced by a model or a tool.
    Text { text: String },
    /// Marks that a tool was invoked with the given arguments.
    ToolCall {
        name: String,
        args: serde_json::Map<String, serde_json::Value>,
    },
}

impl Chunk {
    pub fn text(text: impl Into<String>) -> Self {
        Chunk::Text { text: text.into() }
    }

    pub fn tool_call(
        name: impl Into<String>,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Chunk::ToolCall {
            name: name.into(),
            args,
        }
    }

    /// Get the text if this is a text chunk.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Chunk::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Get the tool name if this is a tool-call chunk.
    pub fn as_tool_call(&self) -> Option<&str> {
        match self {
            Chunk::ToolCall { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// An error surfaced during a turn (model failure, truncated output, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentError {
    pub message: String,
}

/// Bookkeeping for a single model call made while producing content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCallMetadata {
    pub model_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub input_tokens: u32,
    pub cached_input_tokens: u32,
    pub output_tokens: u32,
    pub finish_reason: FinishReason,
}

impl ModelCallMetadata {
    fn started(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            started_at: Some(Utc::now()),
            ended_at: None,
            input_tokens: 0,
            cached_input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Unknown,
        }
    }

    /// Wall-clock seconds the call took, once it has ended.
    pub fn seconds_taken(&self) -> Option<f64> {
        let (start, end) = (self.started_at?, self.ended_at?);
        Some((end - start).num_milliseconds() as f64 / 1000.0)
    }
}

/// Everything produced during one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    chunks: Vec<Chunk>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    errors: Vec<ContentError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    calls: Vec<ModelCallMetadata>,
}

impl Content {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content holding a single text chunk (used for user messages).
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            chunks: vec![Chunk::text(text)],
            ..Default::default()
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn errors(&self) -> &[ContentError] {
        &self.errors
    }

    pub fn calls(&self) -> &[ModelCallMetadata] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenation of all text chunks.
    pub fn text(&self) -> String {
        self.chunks.iter().filter_map(Chunk::as_text).collect()
    }

    /// True until the first chunk or error shows up.
    pub fn is_loading(&self) -> bool {
        self.chunks.is_empty() && self.errors.is_empty()
    }
}

/// A suspension point observed by the caller driving a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// A chunk was appended at `index`.
    ChunkAppended { index: usize, chunk: Chunk },
    /// An error was recorded on the content.
    ErrorRecorded { message: String },
    /// A model call started.
    CallStarted { model_id: String },
    /// A model call finished.
    CallFinished {
        model_id: String,
        finish_reason: FinishReason,
    },
    /// The agent recorded an observation.
    Observed { note: String },
    /// Transient progress message (e.g. the router is deciding).
    Status { message: String },
}

/// Shared, append-only handle on a turn's [`Content`].
///
/// Clones share the same content and event channel.
#[derive(Debug, Clone, Default)]
pub struct ContentBuffer {
    inner: Arc<Mutex<Content>>,
    events: Option<mpsc::UnboundedSender<TurnEvent>>,
}

impl ContentBuffer {
    /// Create a buffer nobody is listening to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer plus the receiving end of its event channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TurnEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let buffer = Self {
            inner: Arc::new(Mutex::new(Content::new())),
            events: Some(tx),
        };
        (buffer, rx)
    }

    /// Read-only view that does not keep the event channel open.
    pub fn view(&self) -> ContentView {
        ContentView {
            inner: Arc::clone(&self.inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Content> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn notify(&self, event: TurnEvent) {
        if let Some(ref tx) = self.events {
            // Receiver gone means nobody renders this turn anymore
            let _ = tx.send(event);
        }
    }

    /// Append a chunk and return its index.
    pub fn append_chunk(&self, chunk: Chunk) -> usize {
        let index = {
            let mut content = self.lock();
            content.chunks.push(chunk.clone());
            content.chunks.len() - 1
        };
        self.notify(TurnEvent::ChunkAppended { index, chunk });
        index
    }

    pub fn append_text(&self, text: impl Into<String>) -> usize {
        self.append_chunk(Chunk::text(text))
    }

    /// Record an error without touching the chunk sequence.
    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.lock().errors.push(ContentError {
            message: message.clone(),
        });
        self.notify(TurnEvent::ErrorRecorded { message });
    }

    pub(crate) fn begin_call(&self, model_id: &str) -> usize {
        let index = {
            let mut content = self.lock();
            content.calls.push(ModelCallMetadata::started(model_id));
            content.calls.len() - 1
        };
        self.notify(TurnEvent::CallStarted {
            model_id: model_id.to_string(),
        });
        index
    }

    pub(crate) fn finish_call(&self, index: usize, metadata: &CompletionMetadata) {
        let finished = {
            let mut content = self.lock();
            content.calls.get_mut(index).map(|call| {
                call.input_tokens = metadata.input_tokens;
                call.cached_input_tokens = metadata.cached_input_tokens;
                call.output_tokens = metadata.output_tokens;
                call.finish_reason = metadata.finish_reason;
                call.ended_at = Some(Utc::now());
                call.model_id.clone()
            })
        };
        if let Some(model_id) = finished {
            self.notify(TurnEvent::CallFinished {
                model_id,
                finish_reason: metadata.finish_reason,
            });
        }
    }

    pub fn len(&self) -> usize {
        self.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> String {
        self.lock().text()
    }

    /// Copy of the content as it stands right now.
    pub fn snapshot(&self) -> Content {
        self.lock().clone()
    }
}

/// Read-only handle on a turn's content, held by renderers.
#[derive(Debug, Clone)]
pub struct ContentView {
    inner: Arc<Mutex<Content>>,
}

impl ContentView {
    fn lock(&self) -> MutexGuard<'_, Content> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn text(&self) -> String {
        self.lock().text()
    }

    pub fn snapshot(&self) -> Content {
        self.lock().clone()
    }
}
