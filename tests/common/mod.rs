//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use tally_gateway::audio::{AudioChunk, AudioSink};
use tally_gateway::ledger::{self, DbPool, User, UserRepo};
use tally_gateway::model::{
    ConversationTurn, ModelConnector, ModelSink, ModelStream, ToolInvocationResult,
};
use tally_gateway::{Error, Result};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    ledger::init_memory().expect("failed to init test db")
}

/// Create a test user in the database
pub fn create_test_user(db: &DbPool, id: &str) -> User {
    UserRepo::new(db.clone())
        .find_or_create(id)
        .expect("failed to create test user")
}

/// Everything the session driver sent to the model
#[derive(Default)]
pub struct SinkLog {
    pub audio: Mutex<Vec<AudioChunk>>,
    pub tool_results: Mutex<Vec<ToolInvocationResult>>,
}

/// Model sink double that records instead of transmitting
pub struct RecordingSink {
    log: Arc<SinkLog>,
}

#[async_trait]
impl ModelSink for RecordingSink {
    async fn send_audio(&self, chunk: &AudioChunk) -> Result<()> {
        self.log.audio.lock().unwrap().push(chunk.clone());
        Ok(())
    }

    async fn send_tool_result(&self, result: &ToolInvocationResult) -> Result<()> {
        self.log.tool_results.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// What a scripted stream does once its turns run out
#[derive(Debug, Clone, Copy)]
pub enum AfterTurns {
    /// Keep the connection open (reads stay pending)
    HangOpen,
    /// Close the stream, as a dropped connection would
    CloseStream,
}

/// Model stream double that plays back a fixed script
pub struct ScriptedStream {
    turns: VecDeque<ConversationTurn>,
    after: AfterTurns,
    hang: Notify,
}

#[async_trait]
impl ModelStream for ScriptedStream {
    async fn next_turn(&mut self) -> Result<Option<ConversationTurn>> {
        if let Some(turn) = self.turns.pop_front() {
            return Ok(Some(turn));
        }
        match self.after {
            AfterTurns::CloseStream => Ok(None),
            AfterTurns::HangOpen => {
                // Never notified; only session teardown ends this read
                self.hang.notified().await;
                Ok(None)
            }
        }
    }
}

/// Connector double handing out one scripted connection
pub struct ScriptedConnector {
    turns: Mutex<Option<VecDeque<ConversationTurn>>>,
    after: AfterTurns,
    pub log: Arc<SinkLog>,
}

impl ScriptedConnector {
    pub fn new(turns: Vec<ConversationTurn>, after: AfterTurns) -> Self {
        Self {
            turns: Mutex::new(Some(turns.into())),
            after,
            log: Arc::new(SinkLog::default()),
        }
    }
}

#[async_trait]
impl ModelConnector for ScriptedConnector {
    async fn connect(&self) -> Result<(Arc<dyn ModelSink>, Box<dyn ModelStream>)> {
        let turns = self
            .turns
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::Connection("already connected".to_string()))?;

        Ok((
            Arc::new(RecordingSink {
                log: Arc::clone(&self.log),
            }),
            Box::new(ScriptedStream {
                turns,
                after: self.after,
                hang: Notify::new(),
            }),
        ))
    }
}

/// Connector double that always refuses
pub struct FailingConnector;

#[async_trait]
impl ModelConnector for FailingConnector {
    async fn connect(&self) -> Result<(Arc<dyn ModelSink>, Box<dyn ModelStream>)> {
        Err(Error::Connection("connection refused".to_string()))
    }
}

/// Audio sink double that collects played chunks
#[derive(Clone, Default)]
pub struct CollectSink {
    pub played: Arc<Mutex<Vec<AudioChunk>>>,
}

impl AudioSink for CollectSink {
    fn play(&mut self, chunk: &AudioChunk) -> Result<()> {
        self.played.lock().unwrap().push(chunk.clone());
        Ok(())
    }
}
