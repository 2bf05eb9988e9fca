//! Playback sink for synthesized audio
//!
//! The drain loop runs as its own task so a slow output device can never
//! starve the session's receive loop; the speaker itself lives on a
//! dedicated render thread because audio streams are pinned to the thread
//! that created them.

use std::collections::VecDeque;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::watch;

use super::chunk::{AudioChunk, PLAYBACK_SAMPLE_RATE};
use super::transport::{OutboundConsumer, Polled};
use crate::{Error, Result};

/// How long the drain loop waits on an empty queue before re-checking the
/// stop signal
pub const DRAIN_POLL: Duration = Duration::from_millis(250);

/// Renders one chunk of synthesized audio
pub trait AudioSink: Send {
    /// Hand a chunk to the output device or client channel
    ///
    /// # Errors
    ///
    /// Returns error if the device is unavailable
    fn play(&mut self, chunk: &AudioChunk) -> Result<()>;
}

/// Sink that discards audio (headless hosts, `--mute`)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&mut self, _chunk: &AudioChunk) -> Result<()> {
        Ok(())
    }
}

/// Plays synthesized audio through the default output device
///
/// Samples are forwarded to a render thread owning the output stream;
/// `play` itself never blocks on the device. Dropping the sink stops the
/// thread and discards anything still buffered.
pub struct SpeakerSink {
    tx: std_mpsc::Sender<Vec<f32>>,
}

impl SpeakerSink {
    /// Create a new speaker sink and its render thread
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened
    pub fn new() -> Result<Self> {
        let (tx, rx) = std_mpsc::channel::<Vec<f32>>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("tally-playback".to_string())
            .spawn(move || render_thread(&rx, &ready_tx))
            .map_err(|e| Error::Playback(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { tx }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Playback(
                "playback thread exited during init".to_string(),
            )),
        }
    }
}

impl AudioSink for SpeakerSink {
    fn play(&mut self, chunk: &AudioChunk) -> Result<()> {
        let samples: Vec<f32> = chunk
            .samples()
            .iter()
            .map(|&s| f32::from(s) / 32768.0)
            .collect();

        self.tx
            .send(samples)
            .map_err(|_| Error::Playback("playback thread stopped".to_string()))
    }
}

/// Render thread body: open the device, then feed the stream's shared
/// buffer until the sink is dropped
fn render_thread(rx: &std_mpsc::Receiver<Vec<f32>>, ready: &std_mpsc::Sender<Result<()>>) {
    let buffer: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));

    let stream = match build_output_stream(&buffer) {
        Ok(stream) => {
            let _ = ready.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    while let Ok(samples) = rx.recv() {
        if let Ok(mut buf) = buffer.lock() {
            buf.extend(samples);
        }
    }

    // Sink dropped: stop the stream and discard whatever is still queued
    drop(stream);
    tracing::debug!("playback render thread stopped");
}

/// Open the default output device at the playback rate
fn build_output_stream(buffer: &Arc<Mutex<VecDeque<f32>>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Playback("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Playback(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
        })
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
        })
        .ok_or_else(|| Error::Playback("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported_config
        .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
        .config();
    let channels = config.channels as usize;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = PLAYBACK_SAMPLE_RATE,
        channels = config.channels,
        "audio playback initialized"
    );

    let callback_buffer = Arc::clone(buffer);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut buf = match callback_buffer.lock() {
                    Ok(buf) => buf,
                    Err(_) => return,
                };
                for frame in data.chunks_mut(channels) {
                    let sample = buf.pop_front().unwrap_or(0.0);
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Playback(e.to_string()))?;

    stream.play().map_err(|e| Error::Playback(e.to_string()))?;

    Ok(stream)
}

/// Drain the outbound queue into the sink until the stop signal fires
///
/// Polls with a bounded wait so a stop request is observed promptly. A sink
/// fault disables rendering but the loop keeps consuming so the session is
/// unaffected; on teardown any unplayed audio is discarded.
pub async fn drain_outbound(
    mut queue: OutboundConsumer,
    mut sink: Box<dyn AudioSink>,
    mut stop: watch::Receiver<bool>,
    poll: Duration,
) {
    let mut faulted = false;

    loop {
        if *stop.borrow() {
            break;
        }

        match queue.pop_timeout(poll).await {
            Polled::Chunk(chunk) => {
                if faulted {
                    continue;
                }
                if let Err(e) = sink.play(&chunk) {
                    tracing::warn!(error = %e, "playback sink failed, discarding further audio");
                    faulted = true;
                }
            }
            Polled::TimedOut => {}
            Polled::Closed => break,
        }
    }

    queue.discard_pending();
    tracing::debug!(faulted, "playback drain stopped");
}
