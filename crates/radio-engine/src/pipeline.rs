//! Paced read, encode and publish loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use radio_audio::FrameSource;
use radio_encoder::{AudioEncoder, EncodedPacket};
use radio_transport::BroadcastSink;

use crate::metrics::MetricsCollector;
use crate::STATS_LOG_INTERVAL;

/// Drives one source read, one encode and one publish per tick.
pub struct Pipeline {
    source: FrameSource,
    encoder: Box<dyn AudioEncoder>,
    sink: Arc<BroadcastSink<EncodedPacket>>,
    metrics: Arc<MetricsCollector>,
    tick: Duration,
}

impl Pipeline {
    /// Assemble a pipeline. `tick` should equal the frame duration.
    pub fn new(
        source: FrameSource,
        encoder: Box<dyn AudioEncoder>,
        sink: Arc<BroadcastSink<EncodedPacket>>,
        metrics: Arc<MetricsCollector>,
        tick: Duration,
    ) -> Self {
        Self {
            source,
            encoder,
            sink,
            metrics,
            tick,
        }
    }

    /// Run until `cancel` fires.
    ///
    /// A tick that comes late because the producer was slow fires once as
    /// soon as possible and the schedule shifts; missed ticks are not burst.
    #[instrument(name = "pipeline", skip_all)]
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            tick = ?self.tick,
            encoder = self.encoder.name(),
            path = %self.source.path().display(),
            "Pipeline starting"
        );

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let start_time = Instant::now();
        let mut last_log_time = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = self.source.next_frame() => frame,
            };

            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Frame read error: {}", e);
                    continue;
                }
            };
            self.metrics.record_frame_read();

            match self.encoder.encode(&frame) {
                Ok(packet) => {
                    let bytes = packet.data.len();
                    let report = self.sink.publish(packet);
                    self.metrics.record_packet(bytes);
                    self.metrics.record_slow_drops(report.slow.len());
                }
                Err(e) => {
                    warn!(sequence = frame.sequence, "Encode error: {}", e);
                    self.metrics.record_encode_drop();
                }
            }

            // Periodic status logging every 5 seconds
            if last_log_time.elapsed() >= STATS_LOG_INTERVAL {
                let stats = self.metrics.snapshot();
                info!(
                    "Stream stats: read={}, published={}, encode_drops={}, slow_drops={}, sessions={}, uptime={:.1}s",
                    stats.frames_read,
                    stats.packets_published,
                    stats.encode_drops,
                    stats.slow_session_drops,
                    self.sink.len(),
                    start_time.elapsed().as_secs_f32()
                );
                last_log_time = Instant::now();
            }
        }

        debug!(
            packets = self.metrics.packets_published(),
            "Pipeline loop exited"
        );
        info!("Pipeline stopped");
    }
}
