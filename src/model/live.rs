//! Live WebSocket connection to the conversational model
//!
//! Implements the [`ModelConnector`] / [`ModelSink`] / [`ModelStream`]
//! seams over a real bidirectional streaming connection. The tool schema
//! and system instruction are supplied once in the setup frame; they are
//! not renegotiated mid-session.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::wire::{
    self, AUDIO_MODALITY, Blob, GenerationConfig, RealtimeInput, RealtimeInputMessage, Setup,
    SetupMessage, ToolResponseMessage,
};
use super::{ConversationTurn, ModelConnector, ModelSink, ModelStream, ToolInvocationResult};
use crate::audio::AudioChunk;
use crate::tools::ToolDeclaration;
use crate::{Config, Error, Result};

/// Live API endpoint for bidirectional generation
const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Opens live model connections from an injected configuration
pub struct LiveConnector {
    api_key: SecretString,
    model_id: String,
    system_instruction: String,
    declarations: Vec<ToolDeclaration>,
}

impl LiveConnector {
    /// Build a connector for the configured model and tool schema
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn new(config: &Config, declarations: Vec<ToolDeclaration>) -> Result<Self> {
        let api_key = config.require_api_key()?.expose_secret().to_owned();
        Ok(Self {
            api_key: SecretString::from(api_key),
            model_id: config.model_id.clone(),
            system_instruction: config.system_instruction.clone(),
            declarations,
        })
    }

    fn setup_frame(&self) -> SetupMessage {
        let tools = if self.declarations.is_empty() {
            Vec::new()
        } else {
            vec![wire::ToolSchema {
                function_declarations: self
                    .declarations
                    .iter()
                    .map(wire::FunctionDeclaration::from)
                    .collect(),
            }]
        };

        SetupMessage {
            setup: Setup {
                model: format!("models/{}", self.model_id),
                generation_config: GenerationConfig {
                    response_modalities: vec![AUDIO_MODALITY.to_string()],
                },
                system_instruction: wire::Content::text(&self.system_instruction),
                tools,
                output_audio_transcription: Some(serde_json::json!({})),
            },
        }
    }
}

#[async_trait]
impl ModelConnector for LiveConnector {
    async fn connect(&self) -> Result<(Arc<dyn ModelSink>, Box<dyn ModelStream>)> {
        let url = format!("{LIVE_ENDPOINT}?key={}", self.api_key.expose_secret());

        let (ws, _response) = connect_async(url).await?;
        let (write, read) = ws.split();
        let write = Arc::new(Mutex::new(write));

        tracing::debug!(model = %self.model_id, "websocket established, sending setup");

        let setup = serde_json::to_string(&self.setup_frame())?;
        write.lock().await.send(Message::Text(setup.into())).await?;

        let mut stream = LiveStream {
            read,
            pending: VecDeque::new(),
        };
        stream.await_setup().await?;

        tracing::info!(model = %self.model_id, "live session connected");

        Ok((Arc::new(LiveSink { write }), Box::new(stream)))
    }
}

/// Send half: shared by the sender (audio) and receiver (tool results)
struct LiveSink {
    write: Arc<Mutex<WsWrite>>,
}

impl LiveSink {
    async fn send_json(&self, payload: String) -> Result<()> {
        self.write
            .lock()
            .await
            .send(Message::Text(payload.into()))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ModelSink for LiveSink {
    async fn send_audio(&self, chunk: &AudioChunk) -> Result<()> {
        let message = RealtimeInputMessage {
            realtime_input: RealtimeInput {
                audio: Blob::from_chunk(chunk),
            },
        };
        self.send_json(serde_json::to_string(&message)?).await
    }

    async fn send_tool_result(&self, result: &ToolInvocationResult) -> Result<()> {
        let message = ToolResponseMessage::from(result);
        tracing::debug!(call_id = %result.call_id, "sending tool result");
        self.send_json(serde_json::to_string(&message)?).await
    }

    async fn close(&self) -> Result<()> {
        self.write.lock().await.send(Message::Close(None)).await?;
        Ok(())
    }
}

/// Receive half: decodes server frames into conversation turns
struct LiveStream {
    read: WsRead,
    pending: VecDeque<ConversationTurn>,
}

impl LiveStream {
    /// Read frames until the server acknowledges the setup
    async fn await_setup(&mut self) -> Result<()> {
        loop {
            let Some(message) = self.next_server_message().await? else {
                return Err(Error::Connection(
                    "connection closed during setup".to_string(),
                ));
            };

            if message.setup_complete.is_some() {
                return Ok(());
            }

            tracing::debug!("ignoring pre-setup frame");
        }
    }

    /// Read and decode the next JSON frame; `None` on close
    async fn next_server_message(&mut self) -> Result<Option<wire::ServerMessage>> {
        loop {
            let Some(frame) = self.read.next().await else {
                return Ok(None);
            };

            match frame? {
                Message::Text(text) => {
                    return Ok(Some(serde_json::from_str(text.as_str())?));
                }
                Message::Binary(bytes) => {
                    return Ok(Some(serde_json::from_slice(&bytes)?));
                }
                Message::Close(_) => return Ok(None),
                // Pings are answered by the transport; nothing to surface
                _ => {}
            }
        }
    }
}

#[async_trait]
impl ModelStream for LiveStream {
    async fn next_turn(&mut self) -> Result<Option<ConversationTurn>> {
        loop {
            if let Some(turn) = self.pending.pop_front() {
                return Ok(Some(turn));
            }

            let Some(message) = self.next_server_message().await? else {
                return Ok(None);
            };

            self.pending.extend(message.into_turns()?);
        }
    }
}
