//! WAV-file replay into the inbound queue
//!
//! Lets a session be driven from a pre-recorded file instead of a live
//! microphone: the feeder pushes capture-format chunks at the capture
//! cadence, so the rest of the pipeline cannot tell the difference.

use std::path::Path;
use std::time::Duration;

use super::capture::f32_to_pcm16;
use super::chunk::{AudioChunk, AudioFormat, CAPTURE_SAMPLE_RATE, Direction};
use super::transport::InboundProducer;
use crate::{Error, Result};

/// A decoded WAV file, normalized to capture format (16kHz mono)
pub struct WavSource {
    samples: Vec<i16>,
}

impl WavSource {
    /// Load and normalize a WAV file
    ///
    /// Stereo is downmixed by averaging; other sample rates are resampled
    /// to the capture rate.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or decoded
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader =
            hound::WavReader::open(path).map_err(|e| Error::Audio(e.to_string()))?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                let max = f32::from(i16::MAX);
                reader
                    .samples::<i16>()
                    .filter_map(std::result::Result::ok)
                    .map(|s| f32::from(s) / max)
                    .collect()
            }
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .filter_map(std::result::Result::ok)
                .collect(),
        };

        let mono = downmix(&samples, spec.channels);

        let normalized = if spec.sample_rate == CAPTURE_SAMPLE_RATE {
            mono
        } else {
            resample(&mono, spec.sample_rate, CAPTURE_SAMPLE_RATE)?
        };

        tracing::debug!(
            path = %path.display(),
            source_rate = spec.sample_rate,
            channels = spec.channels,
            samples = normalized.len(),
            "wav source loaded"
        );

        Ok(Self {
            samples: f32_to_pcm16(&normalized),
        })
    }

    /// Build a source directly from capture-format samples
    #[must_use]
    pub fn from_samples(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// Total duration of the source
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.samples.len() as u64 * 1000 / u64::from(CAPTURE_SAMPLE_RATE))
    }

    /// Split into capture-format chunks of the given duration
    #[must_use]
    pub fn chunks(&self, chunk_ms: u64) -> Vec<AudioChunk> {
        let samples_per_chunk =
            usize::try_from(u64::from(CAPTURE_SAMPLE_RATE) * chunk_ms.max(10) / 1000)
                .unwrap_or(usize::MAX)
                .max(1);

        self.samples
            .chunks(samples_per_chunk)
            .map(|chunk| {
                AudioChunk::from_samples(chunk, AudioFormat::capture(), Direction::Inbound)
            })
            .collect()
    }
}

/// Feed a source into the inbound queue, paced at the chunk duration to
/// mimic a live microphone
///
/// # Errors
///
/// Returns error if the inbound queue consumer has been dropped
pub async fn feed(source: &WavSource, queue: &InboundProducer, chunk_ms: u64) -> Result<()> {
    let chunks = source.chunks(chunk_ms);
    let count = chunks.len();

    let mut ticker = tokio::time::interval(Duration::from_millis(chunk_ms.max(10)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    for chunk in chunks {
        ticker.tick().await;
        queue.push(chunk).await?;
    }

    tracing::info!(chunks = count, "replay feed complete");
    Ok(())
}

/// Average interleaved channels down to mono
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = usize::from(channels);
    samples
        .chunks(channels)
        .map(|frame| {
            #[allow(clippy::cast_precision_loss)]
            let avg = frame.iter().sum::<f32>() / frame.len() as f32;
            avg
        })
        .collect()
}

/// Resample mono audio between rates
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();

    let mut output = Vec::new();

    for chunk in input.chunks(chunk_size) {
        if chunk.len() == chunk_size {
            let result = resampler
                .process(&[chunk.to_vec()], None)
                .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
            output.extend_from_slice(&result[0]);
        }
    }

    Ok(output.iter().map(|&s| s as f32).collect())
}
