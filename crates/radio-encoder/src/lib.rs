//! Opus audio encoding for the radio relay.
//!
//! One encoder instance turns each raw PCM frame into exactly one
//! compressed packet whose nominal duration equals the frame duration.

mod error;
mod opus;

pub use error::EncoderError;
pub use opus::OpusEncoder;

use std::time::Duration;

use bytes::Bytes;

use radio_audio::{RawFrame, CHANNELS, FRAME_DURATION_MS, SAMPLE_RATE};

/// Largest packet the encoder may emit.
pub const MAX_PACKET_SIZE: usize = 4000;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Audio encoding configuration.
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Number of channels.
    pub channels: u16,

    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Encoder complexity (0-10).
    pub complexity: u8,

    /// Whether in-band forward error correction is enabled.
    pub inband_fec: bool,

    /// Expected packet loss percentage (0-100).
    pub packet_loss_percent: u8,

    /// Duration of one input frame.
    pub frame_duration: Duration,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            bitrate_kbps: 128,
            complexity: 8,
            inband_fec: true,
            packet_loss_percent: 5,
            frame_duration: Duration::from_millis(FRAME_DURATION_MS),
        }
    }
}

impl EncoderConfig {
    /// SDP fmtp line advertising this configuration.
    pub fn sdp_fmtp_line(&self) -> String {
        let stereo = u8::from(self.channels == 2);
        format!(
            "minptime=10;useinbandfec={};stereo={};sprop-stereo={};maxaveragebitrate={}",
            u8::from(self.inband_fec),
            stereo,
            stereo,
            self.bitrate_kbps * 1000
        )
    }
}

/// An encoded audio packet.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    /// Encoded Opus data.
    pub data: Bytes,

    /// Nominal playback duration, always the frame duration.
    pub duration: Duration,

    /// Sequence number of the source frame.
    pub sequence: u64,
}

/// Trait for audio encoders.
pub trait AudioEncoder: Send {
    /// Encode exactly one frame into exactly one packet.
    fn encode(&mut self, frame: &RawFrame) -> EncoderResult<EncodedPacket>;

    /// Get encoder name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the audio encoder.
pub fn create_audio_encoder(config: EncoderConfig) -> EncoderResult<Box<dyn AudioEncoder>> {
    let encoder = OpusEncoder::new(config)?;
    tracing::info!("Using {} encoder", encoder.name());
    Ok(Box::new(encoder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmtp_line_matches_config() {
        let config = EncoderConfig::default();

        assert_eq!(
            config.sdp_fmtp_line(),
            "minptime=10;useinbandfec=1;stereo=1;sprop-stereo=1;maxaveragebitrate=128000"
        );
    }
}
