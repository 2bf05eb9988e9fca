//! Streaming session driver
//!
//! Owns the lifetime of one conversational model connection and fans work
//! out to three cooperating tasks: a sender draining the inbound audio
//! queue, a receiver handling model turns, and a playback driver draining
//! the outbound queue. The three run only while the session is `Active`
//! and are torn down together - a fault in any one, or an explicit stop,
//! closes them all as a unit.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::audio::transport::{self, InboundConsumer, OutboundProducer};
use crate::audio::{AudioSink, DRAIN_POLL, drain_outbound};
use crate::model::{ConversationTurn, ModelConnector, ModelSink, ModelStream};
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// Bounded window for sibling tasks to observe the stop signal before
/// they are aborted outright
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Session lifecycle states
///
/// `Closed` is terminal: a driver is not reusable, reconnecting takes a
/// new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Requests session shutdown; clonable across tasks and signal handlers
#[derive(Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal every session task to shut down
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// A receiver that resolves when the signal fires
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Observable events surfaced to the caller while a session runs
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transcription of the model's spoken output
    Transcript(String),
    /// Plain text emitted by the model
    Text(String),
    /// A tool invocation was dispatched and answered
    ToolDispatched {
        call_id: String,
        name: String,
        success: bool,
    },
}

/// Per-session tunables
///
/// Differences between deployment shapes (transcript surfacing, drain
/// cadence) are configuration on the one driver, not separate drivers.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Surface transcript fragments at info level and as events
    pub surface_transcripts: bool,

    /// Bounded wait used by the playback drain loop
    pub drain_poll: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            surface_transcripts: true,
            drain_poll: DRAIN_POLL,
        }
    }
}

/// Drives one live model session from connect to close
pub struct SessionDriver {
    tools: Arc<ToolRegistry>,
    options: SessionOptions,
    state_tx: watch::Sender<SessionState>,
    stop: StopHandle,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl SessionDriver {
    /// Create an idle driver over a dispatch table
    #[must_use]
    pub fn new(tools: ToolRegistry, options: SessionOptions) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            tools: Arc::new(tools),
            options,
            state_tx,
            stop: StopHandle::new(),
            events: None,
        }
    }

    /// Attach an event channel for transcripts and dispatch notices
    #[must_use]
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Watch lifecycle transitions
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Handle for requesting shutdown from outside the driver
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run the session to completion
    ///
    /// Connects, spawns the three tasks, then waits for the first of them
    /// to finish - naturally, by fault, or via the stop signal - and tears
    /// the rest down with it. Consumes the driver: `Closed` is terminal.
    ///
    /// # Errors
    ///
    /// Returns error if the connection cannot be established or drops, or
    /// if a session task faults
    pub async fn run(
        self,
        connector: &dyn ModelConnector,
        inbound: InboundConsumer,
        sink: Box<dyn AudioSink>,
    ) -> Result<()> {
        self.state_tx.send_replace(SessionState::Connecting);
        tracing::debug!("connecting to model");

        let (model, stream) = match connector.connect().await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "connection failed");
                self.state_tx.send_replace(SessionState::Closing);
                self.stop.stop();
                self.state_tx.send_replace(SessionState::Closed);
                return Err(e);
            }
        };

        self.state_tx.send_replace(SessionState::Active);
        tracing::info!("session active");

        let (out_tx, out_rx) = transport::outbound();
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        {
            let model = Arc::clone(&model);
            let stop = self.stop.subscribe();
            tasks.spawn(sender_loop(inbound, model, stop));
        }
        {
            let model = Arc::clone(&model);
            let tools = Arc::clone(&self.tools);
            let events = self.events.clone();
            let stop = self.stop.subscribe();
            let surface_transcripts = self.options.surface_transcripts;
            tasks.spawn(receiver_loop(
                stream,
                model,
                tools,
                out_tx,
                events,
                stop,
                surface_transcripts,
            ));
        }
        {
            let stop = self.stop.subscribe();
            let poll = self.options.drain_poll;
            tasks.spawn(async move {
                drain_outbound(out_rx, sink, stop, poll).await;
                Ok(())
            });
        }

        // First task to finish decides the session outcome
        let mut outcome = Ok(());
        if let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "session task fault");
                    outcome = Err(e);
                }
                Err(e) => {
                    outcome = Err(Error::Session(format!("session task panicked: {e}")));
                }
            }
        }

        // Teardown as a unit: partial shutdown is not a valid state
        self.state_tx.send_replace(SessionState::Closing);
        self.stop.stop();
        tracing::debug!("closing session");

        let drained = tokio::time::timeout(TEARDOWN_TIMEOUT, async {
            while let Some(joined) = tasks.join_next().await {
                if let Ok(Err(e)) = joined {
                    tracing::warn!(error = %e, "session task failed during close");
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!("session tasks did not stop in time, aborting");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        if let Err(e) = model.close().await {
            tracing::debug!(error = %e, "close frame not delivered");
        }

        self.state_tx.send_replace(SessionState::Closed);
        tracing::info!("session closed");

        outcome
    }
}

/// Sender task: dequeue inbound chunks and transmit them on the session
async fn sender_loop(
    mut inbound: InboundConsumer,
    model: Arc<dyn ModelSink>,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        if *stop.borrow() {
            break;
        }

        tokio::select! {
            _ = stop.changed() => {}
            chunk = inbound.pop() => match chunk {
                Some(chunk) => {
                    tracing::trace!(bytes = chunk.len(), "sending audio chunk");
                    model.send_audio(&chunk).await?;
                }
                None => {
                    // Input exhausted (replay finished or capture stopped);
                    // the session stays up for replies until told to stop
                    tracing::debug!("inbound audio exhausted");
                    while !*stop.borrow() {
                        if stop.changed().await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Receiver task: read turns, route audio and transcripts, dispatch tools
///
/// Invocations are handled one at a time - no further turn is read while a
/// result is owed, which keeps call-id bookkeeping trivial and
/// acknowledgements in order.
async fn receiver_loop(
    mut stream: Box<dyn ModelStream>,
    model: Arc<dyn ModelSink>,
    tools: Arc<ToolRegistry>,
    outbound: OutboundProducer,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    mut stop: watch::Receiver<bool>,
    surface_transcripts: bool,
) -> Result<()> {
    loop {
        if *stop.borrow() {
            break;
        }

        let turn = tokio::select! {
            _ = stop.changed() => continue,
            turn = stream.next_turn() => turn?,
        };

        let Some(turn) = turn else {
            if *stop.borrow() {
                break;
            }
            return Err(Error::Connection("model closed the stream".to_string()));
        };

        match turn {
            ConversationTurn::Audio(chunk) => {
                if outbound.push(chunk).is_err() {
                    tracing::debug!("playback gone, dropping audio fragment");
                }
            }
            ConversationTurn::Text(text) => {
                tracing::debug!(%text, "model text");
                emit(events.as_ref(), SessionEvent::Text(text));
            }
            ConversationTurn::Transcript(text) => {
                if surface_transcripts {
                    tracing::info!(%text, "transcript");
                    emit(events.as_ref(), SessionEvent::Transcript(text));
                } else {
                    tracing::debug!(%text, "transcript");
                }
            }
            ConversationTurn::ToolCall(request) => {
                tracing::info!(
                    tool = %request.name,
                    call_id = %request.call_id,
                    "tool invocation requested"
                );

                let result = tools.dispatch(&request).await;
                emit(
                    events.as_ref(),
                    SessionEvent::ToolDispatched {
                        call_id: result.call_id.clone(),
                        name: result.name.clone(),
                        success: result.is_success(),
                    },
                );
                model.send_tool_result(&result).await?;
            }
        }
    }

    Ok(())
}

fn emit(events: Option<&mpsc::UnboundedSender<SessionEvent>>, event: SessionEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_handle_is_shared() {
        let handle = StopHandle::new();
        let clone = handle.clone();

        assert!(!clone.is_stopped());
        handle.stop();
        assert!(clone.is_stopped());
    }

    #[test]
    fn driver_starts_idle() {
        let driver = SessionDriver::new(ToolRegistry::new(), SessionOptions::default());
        assert_eq!(driver.state(), SessionState::Idle);
    }

    #[test]
    fn states_render_lowercase() {
        assert_eq!(SessionState::Active.to_string(), "active");
        assert_eq!(SessionState::Closed.to_string(), "closed");
    }
}
