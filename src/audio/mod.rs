//! Audio pipeline module
//!
//! Handles microphone capture, the transport queues between producers and
//! consumers, playback of synthesized audio, and WAV-file replay for
//! driving sessions without a microphone.

mod capture;
mod chunk;
mod playback;
pub mod replay;
pub mod transport;

pub use capture::{AudioCapture, f32_to_pcm16, pump_capture, samples_to_wav};
pub use chunk::{AudioChunk, AudioFormat, CAPTURE_SAMPLE_RATE, Direction, PLAYBACK_SAMPLE_RATE};
pub use playback::{AudioSink, DRAIN_POLL, NullSink, SpeakerSink, drain_outbound};
