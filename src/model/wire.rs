//! Wire types for the bidirectional live-model protocol
//!
//! JSON frames over a WebSocket: the client opens with a setup frame
//! (model, modalities, tool schema, system instruction), then streams
//! base64 PCM; the server answers with content frames, transcriptions,
//! and tool calls.

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ConversationTurn, ToolInvocationRequest, ToolInvocationResult};
use crate::audio::AudioChunk;
use crate::tools::ToolDeclaration;
use crate::{Error, Result};

/// Response modality requested at setup
pub const AUDIO_MODALITY: &str = "AUDIO";

// ---------------------------------------------------------------------------
// Client -> server frames

/// First frame on a new connection
#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: Setup,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    pub system_instruction: Content,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_transcription: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

/// Tool declarations advertised to the model
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSchema {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDeclaration> for FunctionDeclaration {
    fn from(decl: &ToolDeclaration) -> Self {
        Self {
            name: decl.name.clone(),
            description: decl.description.clone(),
            parameters: decl.parameter_schema(),
        }
    }
}

/// Streaming microphone audio
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInputMessage {
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
pub struct RealtimeInput {
    pub audio: Blob,
}

/// Tool results echoed back for a prior tool call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponseMessage {
    pub tool_response: ToolResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Serialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: Value,
}

impl From<&ToolInvocationResult> for ToolResponseMessage {
    fn from(result: &ToolInvocationResult) -> Self {
        Self {
            tool_response: ToolResponse {
                function_responses: vec![FunctionResponse {
                    id: result.call_id.clone(),
                    name: result.name.clone(),
                    response: result.payload.clone(),
                }],
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Shared content types

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// A single-part text content block
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            parts: vec![Part {
                text: Some(text.to_string()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
}

/// Base64-encoded binary payload with its MIME type
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

impl Blob {
    /// Encode a PCM chunk for the wire
    #[must_use]
    pub fn from_chunk(chunk: &AudioChunk) -> Self {
        Self {
            mime_type: chunk.format().mime_type(),
            data: base64::engine::general_purpose::STANDARD.encode(chunk.data()),
        }
    }

    /// Decode the payload bytes
    ///
    /// # Errors
    ///
    /// Returns error if the payload is not valid base64
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .map_err(|e| Error::Session(format!("invalid audio payload: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Server -> client frames

/// Any frame the server may send; exactly one field is populated per frame
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<Value>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub output_transcription: Option<Transcription>,
    pub turn_complete: bool,
    pub interrupted: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct Transcription {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ServerMessage {
    /// Flatten a server frame into the turns it carries, in frame order
    ///
    /// # Errors
    ///
    /// Returns error if an audio payload cannot be decoded
    pub fn into_turns(self) -> Result<Vec<ConversationTurn>> {
        let mut turns = Vec::new();

        if let Some(content) = self.server_content {
            if let Some(model_turn) = content.model_turn {
                for part in model_turn.parts {
                    if let Some(text) = part.text {
                        turns.push(ConversationTurn::Text(text));
                    }
                    if let Some(blob) = part.inline_data {
                        turns.push(ConversationTurn::Audio(AudioChunk::outbound(blob.decode()?)));
                    }
                }
            }
            if let Some(transcription) = content.output_transcription {
                if !transcription.text.is_empty() {
                    turns.push(ConversationTurn::Transcript(transcription.text));
                }
            }
        }

        if let Some(tool_call) = self.tool_call {
            for call in tool_call.function_calls {
                turns.push(ConversationTurn::ToolCall(ToolInvocationRequest {
                    call_id: call.id,
                    name: call.name,
                    arguments: call.args,
                }));
            }
        }

        Ok(turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InvocationStatus;

    #[test]
    fn setup_frame_uses_camel_case_keys() {
        let setup = SetupMessage {
            setup: Setup {
                model: "models/test".to_string(),
                generation_config: GenerationConfig {
                    response_modalities: vec![AUDIO_MODALITY.to_string()],
                },
                system_instruction: Content::text("be helpful"),
                tools: vec![],
                output_audio_transcription: Some(serde_json::json!({})),
            },
        };

        let json = serde_json::to_string(&setup).unwrap();
        assert!(json.contains("generationConfig"));
        assert!(json.contains("responseModalities"));
        assert!(json.contains("systemInstruction"));
        assert!(json.contains("outputAudioTranscription"));
        assert!(!json.contains("tools"), "empty tool list should be omitted");
    }

    #[test]
    fn server_content_frame_becomes_audio_and_transcript_turns() {
        let frame = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAABAA=="}}
                    ]
                },
                "outputTranscription": {"text": "twenty five dollars"}
            }
        }"#;

        let msg: ServerMessage = serde_json::from_str(frame).unwrap();
        let turns = msg.into_turns().unwrap();

        assert_eq!(turns.len(), 2);
        match &turns[0] {
            ConversationTurn::Audio(chunk) => assert_eq!(chunk.samples(), vec![0, 1]),
            other => panic!("expected audio turn, got {other:?}"),
        }
        assert_eq!(
            turns[1],
            ConversationTurn::Transcript("twenty five dollars".to_string())
        );
    }

    #[test]
    fn tool_call_frame_becomes_invocation_request() {
        let frame = r#"{
            "toolCall": {
                "functionCalls": [
                    {"id": "call-1", "name": "add_to_database",
                     "args": {"amount": 25.5, "category": "Food & Dining"}}
                ]
            }
        }"#;

        let msg: ServerMessage = serde_json::from_str(frame).unwrap();
        let turns = msg.into_turns().unwrap();

        assert_eq!(turns.len(), 1);
        let ConversationTurn::ToolCall(request) = &turns[0] else {
            panic!("expected tool call turn");
        };
        assert_eq!(request.call_id, "call-1");
        assert_eq!(request.name, "add_to_database");
        assert_eq!(request.arguments.get("amount").unwrap().as_f64(), Some(25.5));
    }

    #[test]
    fn tool_response_echoes_call_id() {
        let result = ToolInvocationResult {
            call_id: "call-9".to_string(),
            name: "add_to_database".to_string(),
            status: InvocationStatus::Success,
            payload: serde_json::json!({"status": "success"}),
        };

        let message = ToolResponseMessage::from(&result);
        let json = serde_json::to_string(&message).unwrap();

        assert!(json.contains("toolResponse"));
        assert!(json.contains("functionResponses"));
        assert!(json.contains("\"id\":\"call-9\""));
    }

    #[test]
    fn malformed_audio_payload_is_an_error() {
        let frame = r#"{
            "serverContent": {
                "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "!!!"}}]}
            }
        }"#;

        let msg: ServerMessage = serde_json::from_str(frame).unwrap();
        assert!(msg.into_turns().is_err());
    }
}
