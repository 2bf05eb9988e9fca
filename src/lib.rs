//! Tally Gateway - voice transaction capture for personal finance
//!
//! This library implements the pipeline from raw microphone audio to a
//! persisted transaction record:
//! - Audio transport queues between capture, session, and playback
//! - A streaming session driver over one live conversational model connection
//! - A tool dispatch table that turns model-requested actions into local calls
//! - A transaction materializer that validates and persists extracted entries
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Inputs                          │
//! │        Microphone   │   WAV replay (testing)         │
//! └──────────────────────────┬───────────────────────────┘
//!                            │ inbound queue (bounded)
//! ┌──────────────────────────▼───────────────────────────┐
//! │                  Session Driver                      │
//! │    Sender  │  Receiver  │  Playback driver           │
//! └───────┬──────────────────────────────┬───────────────┘
//!         │ tool invocations             │ outbound queue
//! ┌───────▼───────────┐         ┌────────▼───────────────┐
//! │  Tool Dispatch    │         │     Playback Sink      │
//! │  └ Materializer   │         │     (speaker/null)     │
//! └───────┬───────────┘         └────────────────────────┘
//!         │
//! ┌───────▼───────────┐
//! │  SQLite ledger    │
//! └───────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod ledger;
pub mod model;
pub mod session;
pub mod setup;
pub mod tools;

pub use audio::{AudioChunk, AudioFormat, Direction};
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{
    Category, DbConn, DbPool, ExtractedTransaction, PersistedTransaction, TransactionMaterializer,
    TransactionRepo, UserRepo,
};
pub use model::{
    ConversationTurn, InvocationStatus, ModelConnector, ModelSink, ModelStream,
    ToolInvocationRequest, ToolInvocationResult,
};
pub use session::{SessionDriver, SessionEvent, SessionOptions, SessionState, StopHandle};
pub use tools::{ParamKind, ParamSpec, ToolDeclaration, ToolHandler, ToolRegistry};
