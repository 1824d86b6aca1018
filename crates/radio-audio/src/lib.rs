//! Raw PCM frame source for the radio relay.
//!
//! This crate reads fixed-size frames of interleaved little-endian 16-bit
//! PCM from an external producer (normally a named pipe), reopening the
//! endpoint whenever the producer goes away.

mod error;
mod frame;
mod policy;
mod source;

pub use error::AudioError;
pub use frame::{FrameFormat, RawFrame};
pub use policy::ReconnectPolicy;
pub use source::{FrameSource, SourceStatus};

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48000;

/// Number of audio channels.
pub const CHANNELS: u16 = 2;

/// Bytes per sample (s16le).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Duration of one frame in milliseconds.
pub const FRAME_DURATION_MS: u64 = 20;

/// Samples per channel in one frame (20ms at 48kHz).
pub const SAMPLES_PER_FRAME: usize = 960;

/// Bytes in one frame of interleaved stereo s16le.
pub const BYTES_PER_FRAME: usize = SAMPLES_PER_FRAME * CHANNELS as usize * BYTES_PER_SAMPLE;

/// Default delay between producer open attempts in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;
