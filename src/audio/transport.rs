//! Transport queues between audio producers and consumers
//!
//! Two independent single-producer/single-consumer queues carry
//! [`AudioChunk`]s through the pipeline: a bounded inbound queue
//! (microphone toward the session) that suspends its producer when full,
//! and an unbounded outbound queue (session toward playback). Both
//! preserve arrival order; there is no reordering or coalescing.

use std::time::Duration;

use tokio::sync::mpsc;

use super::AudioChunk;
use crate::{Error, Result};

/// Default capacity of the inbound queue before the capture side suspends
pub const DEFAULT_INBOUND_CAPACITY: usize = 5;

/// Producer half of the inbound (microphone) queue
pub struct InboundProducer {
    tx: mpsc::Sender<AudioChunk>,
}

/// Consumer half of the inbound (microphone) queue
pub struct InboundConsumer {
    rx: mpsc::Receiver<AudioChunk>,
}

/// Producer half of the outbound (playback) queue
pub struct OutboundProducer {
    tx: mpsc::UnboundedSender<AudioChunk>,
}

/// Consumer half of the outbound (playback) queue
pub struct OutboundConsumer {
    rx: mpsc::UnboundedReceiver<AudioChunk>,
}

/// Outcome of a bounded-wait dequeue on the outbound queue
#[derive(Debug)]
pub enum Polled {
    /// The next chunk in arrival order
    Chunk(AudioChunk),
    /// Nothing arrived within the wait
    TimedOut,
    /// The producer is gone and the queue is drained
    Closed,
}

/// Create the bounded inbound queue
///
/// Enqueueing into a full queue suspends the producer until the consumer
/// frees a slot; chunks are never dropped or reordered.
#[must_use]
pub fn inbound(capacity: usize) -> (InboundProducer, InboundConsumer) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (InboundProducer { tx }, InboundConsumer { rx })
}

/// Create the unbounded outbound queue
///
/// Playback is expected to keep pace with synthesis; the missing bound is
/// a deliberate carry-over and a known risk if a sink ever stalls without
/// faulting.
#[must_use]
pub fn outbound() -> (OutboundProducer, OutboundConsumer) {
    let (tx, rx) = mpsc::unbounded_channel();
    (OutboundProducer { tx }, OutboundConsumer { rx })
}

impl InboundProducer {
    /// Enqueue a chunk, waiting while the queue is at capacity
    ///
    /// # Errors
    ///
    /// Returns error if the consumer has been dropped
    pub async fn push(&self, chunk: AudioChunk) -> Result<()> {
        self.tx
            .send(chunk)
            .await
            .map_err(|_| Error::Audio("inbound queue closed".to_string()))
    }
}

impl InboundConsumer {
    /// Dequeue the next chunk in arrival order
    ///
    /// Returns `None` once the producer is dropped and the queue is drained.
    pub async fn pop(&mut self) -> Option<AudioChunk> {
        self.rx.recv().await
    }
}

impl OutboundProducer {
    /// Enqueue a chunk without waiting
    ///
    /// # Errors
    ///
    /// Returns error if the consumer has been dropped
    pub fn push(&self, chunk: AudioChunk) -> Result<()> {
        self.tx
            .send(chunk)
            .map_err(|_| Error::Audio("outbound queue closed".to_string()))
    }
}

impl OutboundConsumer {
    /// Dequeue the next chunk in arrival order
    pub async fn pop(&mut self) -> Option<AudioChunk> {
        self.rx.recv().await
    }

    /// Dequeue with a bounded wait so the caller can re-check a stop signal
    pub async fn pop_timeout(&mut self, wait: Duration) -> Polled {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(chunk)) => Polled::Chunk(chunk),
            Ok(None) => Polled::Closed,
            Err(_) => Polled::TimedOut,
        }
    }

    /// Discard everything currently buffered
    pub fn discard_pending(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}
