//! Opus audio encoder.

use audiopus::coder::Encoder;
use audiopus::{Application, Bitrate, Channels, SampleRate};
use bytes::Bytes;
use tracing::{debug, instrument, trace};

use radio_audio::{FrameFormat, RawFrame};

use crate::error::EncoderError;
use crate::{AudioEncoder, EncodedPacket, EncoderConfig, EncoderResult, MAX_PACKET_SIZE};

/// Frame durations libopus accepts, in microseconds.
const VALID_FRAME_MICROS: [u128; 6] = [2_500, 5_000, 10_000, 20_000, 40_000, 60_000];

/// Opus encoder tuned for music streaming with loss resilience.
pub struct OpusEncoder {
    encoder: Encoder,
    config: EncoderConfig,
    /// Interleaved samples expected per frame.
    frame_samples: usize,
    frame_count: u64,
    /// Output buffer for encoded data.
    output_buffer: Vec<u8>,
}

impl OpusEncoder {
    /// Create a new Opus encoder.
    #[instrument(name = "opus_new", skip_all)]
    pub fn new(config: EncoderConfig) -> EncoderResult<Self> {
        debug!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            bitrate_kbps = config.bitrate_kbps,
            complexity = config.complexity,
            inband_fec = config.inband_fec,
            packet_loss_percent = config.packet_loss_percent,
            "Initializing Opus encoder"
        );

        let sample_rate = match config.sample_rate {
            8000 => SampleRate::Hz8000,
            12000 => SampleRate::Hz12000,
            16000 => SampleRate::Hz16000,
            24000 => SampleRate::Hz24000,
            48000 => SampleRate::Hz48000,
            other => {
                return Err(EncoderError::UnsupportedConfig(format!(
                    "sample rate {} Hz",
                    other
                )))
            }
        };

        let channels = match config.channels {
            1 => Channels::Mono,
            2 => Channels::Stereo,
            other => {
                return Err(EncoderError::UnsupportedConfig(format!(
                    "{} channels",
                    other
                )))
            }
        };

        if config.complexity > 10 {
            return Err(EncoderError::UnsupportedConfig(format!(
                "complexity {} (must be 0-10)",
                config.complexity
            )));
        }

        if config.packet_loss_percent > 100 {
            return Err(EncoderError::UnsupportedConfig(format!(
                "packet loss {}%",
                config.packet_loss_percent
            )));
        }

        if !VALID_FRAME_MICROS.contains(&config.frame_duration.as_micros()) {
            return Err(EncoderError::UnsupportedConfig(format!(
                "frame duration {:?}",
                config.frame_duration
            )));
        }

        let mut encoder = Encoder::new(sample_rate, channels, Application::Audio)
            .map_err(|e| EncoderError::Initialization(format!("opus init failed: {:?}", e)))?;

        let bitrate = i32::try_from(config.bitrate_kbps.saturating_mul(1000))
            .map_err(|_| EncoderError::UnsupportedConfig("bitrate too large".into()))?;
        encoder
            .set_bitrate(Bitrate::BitsPerSecond(bitrate))
            .map_err(|e| EncoderError::Initialization(format!("set bitrate failed: {:?}", e)))?;

        encoder
            .set_complexity(config.complexity)
            .map_err(|e| EncoderError::Initialization(format!("set complexity failed: {:?}", e)))?;

        encoder
            .set_inband_fec(config.inband_fec)
            .map_err(|e| EncoderError::Initialization(format!("set FEC failed: {:?}", e)))?;

        encoder
            .set_packet_loss_perc(config.packet_loss_percent)
            .map_err(|e| {
                EncoderError::Initialization(format!("set packet loss failed: {:?}", e))
            })?;

        let format = FrameFormat {
            sample_rate: config.sample_rate,
            channels: config.channels,
            frame_duration: config.frame_duration,
        };
        let frame_samples = format.interleaved_samples();

        debug!(frame_samples, "Opus encoder initialized");

        Ok(Self {
            encoder,
            config,
            frame_samples,
            frame_count: 0,
            output_buffer: vec![0u8; MAX_PACKET_SIZE],
        })
    }

    /// Number of frames encoded so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl AudioEncoder for OpusEncoder {
    #[instrument(name = "opus_encode", skip_all, fields(sequence = frame.sequence))]
    fn encode(&mut self, frame: &RawFrame) -> EncoderResult<EncodedPacket> {
        if frame.sample_count() != self.frame_samples {
            return Err(EncoderError::InvalidInput(format!(
                "Expected {} samples, got {}",
                self.frame_samples,
                frame.sample_count()
            )));
        }

        let pcm = frame.to_i16_samples();

        let len = self
            .encoder
            .encode(&pcm, &mut self.output_buffer)
            .map_err(|e| EncoderError::Encoding(format!("opus encode failed: {:?}", e)))?;

        trace!(bytes = len, frame = self.frame_count, "Encoded Opus frame");

        self.frame_count += 1;

        Ok(EncodedPacket {
            data: Bytes::copy_from_slice(&self.output_buffer[..len]),
            duration: self.config.frame_duration,
            sequence: frame.sequence,
        })
    }

    fn name(&self) -> &'static str {
        "Opus"
    }
}

impl Drop for OpusEncoder {
    fn drop(&mut self) {
        debug!(frames = self.frame_count, "Closing Opus encoder");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_silence_frame_yields_one_packet() {
        let mut encoder = OpusEncoder::new(EncoderConfig::default()).unwrap();
        let frame = RawFrame::silence(3, &FrameFormat::default());

        let packet = encoder.encode(&frame).unwrap();

        assert!(!packet.data.is_empty());
        assert!(packet.data.len() <= MAX_PACKET_SIZE);
        assert_eq!(packet.duration, Duration::from_millis(20));
        assert_eq!(packet.sequence, 3);
        assert_eq!(encoder.frame_count(), 1);
    }

    #[test]
    fn test_encoder_settings_are_applied() {
        let config = EncoderConfig {
            complexity: 6,
            packet_loss_percent: 12,
            ..EncoderConfig::default()
        };
        let encoder = OpusEncoder::new(config).unwrap();

        assert_eq!(encoder.encoder.complexity().unwrap(), 6);
        assert!(encoder.encoder.inband_fec().unwrap());
        assert_eq!(encoder.encoder.packet_loss_perc().unwrap(), 12);
    }

    #[test]
    fn test_wrong_frame_size_is_rejected() {
        let mut encoder = OpusEncoder::new(EncoderConfig::default()).unwrap();
        let frame = RawFrame {
            data: Bytes::from(vec![0u8; 1920]),
            sequence: 0,
        };

        let err = encoder.encode(&frame).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidInput(_)));
        assert_eq!(encoder.frame_count(), 0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let too_complex = EncoderConfig {
            complexity: 11,
            ..EncoderConfig::default()
        };
        assert!(matches!(
            OpusEncoder::new(too_complex),
            Err(EncoderError::UnsupportedConfig(_))
        ));

        let odd_rate = EncoderConfig {
            sample_rate: 44100,
            ..EncoderConfig::default()
        };
        assert!(OpusEncoder::new(odd_rate).is_err());

        let odd_duration = EncoderConfig {
            frame_duration: Duration::from_millis(25),
            ..EncoderConfig::default()
        };
        assert!(OpusEncoder::new(odd_duration).is_err());
    }
}
