//! Raw PCM frames and their format.

use std::time::Duration;

use bytes::Bytes;

use crate::error::AudioError;
use crate::{AudioResult, BYTES_PER_SAMPLE, CHANNELS, FRAME_DURATION_MS, SAMPLE_RATE};

/// Shape of the raw PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of interleaved channels.
    pub channels: u16,

    /// Duration of one frame.
    pub frame_duration: Duration,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            frame_duration: Duration::from_millis(FRAME_DURATION_MS),
        }
    }
}

impl FrameFormat {
    /// Samples per channel in one frame.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u128 * self.frame_duration.as_micros() / 1_000_000) as usize
    }

    /// Interleaved samples in one frame, across all channels.
    pub fn interleaved_samples(&self) -> usize {
        self.samples_per_frame() * self.channels as usize
    }

    /// Bytes in one frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.interleaved_samples() * BYTES_PER_SAMPLE
    }
}

/// One fixed-duration slice of interleaved s16le audio.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Interleaved little-endian 16-bit samples.
    pub data: Bytes,

    /// Monotonically increasing sequence number, preserved across reconnects.
    pub sequence: u64,
}

impl RawFrame {
    /// Wrap a buffer that must hold exactly one frame of `format`.
    pub fn new(data: Bytes, sequence: u64, format: &FrameFormat) -> AudioResult<Self> {
        let expected = format.bytes_per_frame();
        if data.len() != expected {
            return Err(AudioError::InvalidFormat(format!(
                "Expected {} bytes, got {}",
                expected,
                data.len()
            )));
        }

        Ok(Self {
            data,
            sequence,
        })
    }

    /// Frame of digital silence.
    pub fn silence(sequence: u64, format: &FrameFormat) -> Self {
        Self {
            data: Bytes::from(vec![0u8; format.bytes_per_frame()]),
            sequence,
        }
    }

    /// Number of interleaved samples in this frame.
    pub fn sample_count(&self) -> usize {
        self.data.len() / BYTES_PER_SAMPLE
    }

    /// Decode the samples to native i16.
    pub fn to_i16_samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }
}
