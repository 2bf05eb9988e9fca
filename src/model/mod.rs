//! Conversational model session types
//!
//! The session driver talks to the model through the [`ModelSink`] /
//! [`ModelStream`] seams; [`live`] implements them over a WebSocket
//! connection, and tests substitute scripted doubles.

pub mod live;
pub mod wire;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::Result;
use crate::audio::AudioChunk;

pub use live::LiveConnector;

/// One unit of model output in the streaming exchange
///
/// Ephemeral - consumed once per turn, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationTurn {
    /// Plain text emitted by the model
    Text(String),
    /// A fragment of synthesized speech
    Audio(AudioChunk),
    /// Transcription of the model's spoken output
    Transcript(String),
    /// A request to invoke a registered tool
    ToolCall(ToolInvocationRequest),
}

/// A model-initiated request to call a locally registered tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationRequest {
    /// Identifier that must be echoed back exactly in the result
    pub call_id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Whether a dispatched invocation succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationStatus {
    Success,
    Failure,
}

/// Outcome of a dispatched tool invocation
///
/// Every observed [`ToolInvocationRequest`] yields exactly one of these,
/// sent back before the session reads further turns - handler failure
/// included.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocationResult {
    pub call_id: String,
    pub name: String,
    pub status: InvocationStatus,
    pub payload: Value,
}

impl ToolInvocationResult {
    /// A successful result carrying the handler's payload
    #[must_use]
    pub fn success(call_id: &str, name: &str, payload: Value) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            status: InvocationStatus::Success,
            payload,
        }
    }

    /// A failure result describing what went wrong
    #[must_use]
    pub fn failure(call_id: &str, name: &str, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            status: InvocationStatus::Failure,
            payload: json!({ "status": "failure", "error": message.into() }),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, InvocationStatus::Success)
    }
}

/// Send half of a live model connection
///
/// Shared between the sender task (audio) and the receiver task (tool
/// results), so all methods take `&self`.
#[async_trait]
pub trait ModelSink: Send + Sync {
    /// Transmit one chunk of microphone audio
    async fn send_audio(&self, chunk: &AudioChunk) -> Result<()>;

    /// Echo a tool result back for the invocation that produced it
    async fn send_tool_result(&self, result: &ToolInvocationResult) -> Result<()>;

    /// Close the connection (best effort)
    async fn close(&self) -> Result<()>;
}

/// Receive half of a live model connection
#[async_trait]
pub trait ModelStream: Send {
    /// Read the next turn; `Ok(None)` means the server closed the stream
    async fn next_turn(&mut self) -> Result<Option<ConversationTurn>>;
}

/// Opens live model connections
#[async_trait]
pub trait ModelConnector: Send + Sync {
    /// Establish a connection and split it into its two halves
    async fn connect(&self) -> Result<(Arc<dyn ModelSink>, Box<dyn ModelStream>)>;
}
