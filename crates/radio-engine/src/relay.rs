//! The relay: one pipeline, one sink, many sessions.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use radio_audio::{FrameFormat, FrameSource, ReconnectPolicy, SourceStatus};
use radio_encoder::{create_audio_encoder, EncodedPacket, EncoderConfig};
use radio_ipc::{CloseReason, Notification, RelayConfig, RelayStats, SessionDescription, UpdateMessage};
use radio_transport::{
    BroadcastSink, NegotiatedSession, NegotiatorConfig, PublishReport, SessionId,
    SessionNegotiator, TransportResult,
};

use crate::control::GenreControl;
use crate::error::ControlError;
use crate::metrics::MetricsCollector;
use crate::notify::NotificationHub;
use crate::pipeline::Pipeline;
use crate::EngineResult;

/// Owns every long-lived component of the relay.
pub struct Relay {
    sink: Arc<BroadcastSink<EncodedPacket>>,
    negotiator: SessionNegotiator,
    control: GenreControl,
    hub: NotificationHub,
    metrics: Arc<MetricsCollector>,
    source_status: SourceStatus,
    cancel: CancellationToken,
    pipeline: Mutex<Option<JoinHandle<()>>>,
}

impl Relay {
    /// Build the encoder, start the pipeline task and return the relay.
    ///
    /// Must be called from within a tokio runtime. Fails only if the encoder
    /// cannot be constructed.
    #[instrument(name = "relay_start", skip_all)]
    pub fn start(config: RelayConfig) -> EngineResult<Arc<Self>> {
        let format = FrameFormat::default();
        let encoder_config = EncoderConfig {
            sample_rate: format.sample_rate,
            channels: format.channels,
            bitrate_kbps: config.bitrate_kbps,
            complexity: config.complexity,
            inband_fec: config.inband_fec,
            packet_loss_percent: config.packet_loss_percent,
            frame_duration: format.frame_duration,
        };
        let encoder = create_audio_encoder(encoder_config.clone())?;

        let source = FrameSource::new(
            &config.pipe_path,
            format,
            ReconnectPolicy::fixed(config.reconnect_delay()),
        );
        let source_status = source.status();

        let cancel = CancellationToken::new();
        let sink = Arc::new(BroadcastSink::new(config.session_queue_capacity));
        let metrics = Arc::new(MetricsCollector::new());

        let negotiator = SessionNegotiator::new(
            NegotiatorConfig {
                ice_servers: config.ice_servers.clone(),
                gather_timeout: config.gather_timeout(),
                encoder: encoder_config,
            },
            Arc::clone(&sink),
            cancel.child_token(),
        );

        let control = GenreControl::new(
            config.default_genre.clone(),
            &config.signal_path,
            config.signal_prefix.clone(),
        );

        metrics.start();
        let pipeline = Pipeline::new(
            source,
            encoder,
            Arc::clone(&sink),
            Arc::clone(&metrics),
            format.frame_duration,
        );
        let handle = tokio::spawn(pipeline.run(cancel.child_token()));

        info!(
            pipe = %config.pipe_path,
            signal = %config.signal_path,
            genre = %config.default_genre,
            "Relay started"
        );

        Ok(Arc::new(Self {
            sink,
            negotiator,
            control,
            hub: NotificationHub::new(config.notification_queue_capacity),
            metrics,
            source_status,
            cancel,
            pipeline: Mutex::new(Some(handle)),
        }))
    }

    /// Negotiate a new playback session.
    pub async fn negotiate(&self, offer: SessionDescription) -> TransportResult<NegotiatedSession> {
        self.negotiator.negotiate(offer).await
    }

    /// Tear down a session on client request.
    pub fn close_session(&self, id: SessionId) -> TransportResult<()> {
        self.negotiator.close_session(id, CloseReason::ClientTeardown)
    }

    /// The current genre.
    pub fn genre(&self) -> String {
        self.control.genre()
    }

    /// Change the genre and announce it to notification subscribers.
    pub async fn set_genre(&self, genre: &str) -> Result<(), ControlError> {
        self.control.set_genre(genre).await?;
        self.hub.publish(Notification::GenreChange {
            new_genre_name: genre.to_string(),
            reason: None,
        });
        Ok(())
    }

    /// Push a notification to every subscriber.
    pub fn notify(&self, notification: Notification) -> PublishReport {
        self.hub.publish(notification)
    }

    /// Subscribe to notifications.
    pub fn subscribe(&self) -> (SessionId, mpsc::Receiver<UpdateMessage>) {
        self.hub.subscribe()
    }

    /// Drop a notification subscription.
    pub fn unsubscribe(&self, id: SessionId) -> bool {
        self.hub.unsubscribe(id)
    }

    /// Current counters.
    pub fn stats(&self) -> RelayStats {
        let registry = self.negotiator.registry();
        RelayStats {
            source_reconnects: self.source_status.reconnects(),
            source_state: self.source_status.state(),
            sessions_opened: registry.opened(),
            sessions_closed: registry.closed(),
            active_sessions: self.sink.len(),
            genre: self.genre(),
            ..self.metrics.snapshot()
        }
    }

    /// Stop the pipeline and close every session.
    #[instrument(name = "relay_shutdown", skip_all)]
    pub async fn shutdown(&self) {
        info!("Relay shutting down");
        self.cancel.cancel();
        self.negotiator.shutdown();

        let handle = self.pipeline.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Pipeline task ended abnormally: {}", e);
            }
        }

        self.metrics.stop();
        info!("Relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &std::path::Path) -> RelayConfig {
        RelayConfig {
            pipe_path: dir.join("audio_pipe").display().to_string(),
            signal_path: dir.join("genre_request.txt").display().to_string(),
            ice_servers: Vec::new(),
            reconnect_delay_ms: 10,
            ..RelayConfig::default()
        }
    }

    #[tokio::test]
    async fn test_set_genre_announces_change() {
        let dir = tempfile::tempdir().unwrap();
        let relay = Relay::start(config(dir.path())).unwrap();
        let (_id, mut rx) = relay.subscribe();

        relay.set_genre("jazz").await.unwrap();

        assert_eq!(relay.genre(), "jazz");
        let msg = rx.try_recv().unwrap();
        assert_eq!(
            msg.notification,
            Notification::GenreChange {
                new_genre_name: "jazz".into(),
                reason: None,
            }
        );
        assert_eq!(relay.stats().genre, "jazz");

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_runs_without_producer_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let relay = Relay::start(config(dir.path())).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let stats = relay.stats();
        assert_eq!(stats.frames_read, 0);
        assert!(!stats.source_state.is_connected());

        tokio::time::timeout(std::time::Duration::from_secs(5), relay.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_streams_from_producer() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::write(&config.pipe_path, vec![0u8; radio_audio::BYTES_PER_FRAME * 3]).unwrap();
        let relay = Relay::start(config).unwrap();

        let mut sink_rx = relay.sink.attach(SessionId::new(9999));
        let packet = tokio::time::timeout(std::time::Duration::from_secs(5), sink_rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(packet.duration, std::time::Duration::from_millis(20));
        assert!(relay.stats().packets_published >= 1);

        relay.shutdown().await;
    }
}
