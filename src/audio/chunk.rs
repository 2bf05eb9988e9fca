//! Audio chunk and format types

/// Sample rate for microphone capture (16kHz for speech)
pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Sample rate of synthesized model audio (24kHz)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Encoding descriptor for a PCM buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channels: u16,
}

impl AudioFormat {
    /// 16-bit mono PCM at the capture rate
    #[must_use]
    pub const fn capture() -> Self {
        Self {
            sample_rate: CAPTURE_SAMPLE_RATE,
            bits_per_sample: 16,
            channels: 1,
        }
    }

    /// 16-bit mono PCM at the synthesized playback rate
    #[must_use]
    pub const fn playback() -> Self {
        Self {
            sample_rate: PLAYBACK_SAMPLE_RATE,
            bits_per_sample: 16,
            channels: 1,
        }
    }

    /// MIME type declared on the wire (e.g. `audio/pcm;rate=16000`)
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }
}

/// Which way a chunk travels through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Microphone toward the model
    Inbound,
    /// Synthesized model audio toward playback
    Outbound,
}

/// An immutable buffer of raw PCM audio
///
/// Ownership transfers from producer to queue to consumer; chunks are never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    data: Vec<u8>,
    format: AudioFormat,
    direction: Direction,
}

impl AudioChunk {
    #[must_use]
    pub const fn new(data: Vec<u8>, format: AudioFormat, direction: Direction) -> Self {
        Self {
            data,
            format,
            direction,
        }
    }

    /// A capture-format chunk headed for the model
    #[must_use]
    pub const fn inbound(data: Vec<u8>) -> Self {
        Self::new(data, AudioFormat::capture(), Direction::Inbound)
    }

    /// A playback-format chunk of synthesized audio
    #[must_use]
    pub const fn outbound(data: Vec<u8>) -> Self {
        Self::new(data, AudioFormat::playback(), Direction::Outbound)
    }

    /// Build a chunk from 16-bit samples (little-endian on the wire)
    #[must_use]
    pub fn from_samples(samples: &[i16], format: AudioFormat, direction: Direction) -> Self {
        let mut data = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            data.extend_from_slice(&sample.to_le_bytes());
        }
        Self::new(data, format, direction)
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub const fn format(&self) -> AudioFormat {
        self.format
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Interpret the payload as 16-bit little-endian samples
    #[must_use]
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_round_trip() {
        let samples = [0_i16, 100, -100, i16::MAX, i16::MIN];
        let chunk = AudioChunk::from_samples(&samples, AudioFormat::capture(), Direction::Inbound);

        assert_eq!(chunk.len(), samples.len() * 2);
        assert_eq!(chunk.samples(), samples);
    }

    #[test]
    fn mime_type_carries_sample_rate() {
        assert_eq!(AudioFormat::capture().mime_type(), "audio/pcm;rate=16000");
        assert_eq!(AudioFormat::playback().mime_type(), "audio/pcm;rate=24000");
    }
}
