//! Per-client offer/answer negotiation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_OPUS};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use radio_encoder::{EncodedPacket, EncoderConfig};
use radio_ipc::{CloseReason, SdpType, SessionDescription};

use crate::error::TransportError;
use crate::session::{drain_feedback, run_output_leg, Session, SessionRegistry};
use crate::sink::{BroadcastSink, SessionId};
use crate::{TransportResult, DEFAULT_GATHER_TIMEOUT};

/// Negotiation settings.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// STUN/TURN URLs handed to every peer connection.
    pub ice_servers: Vec<String>,

    /// Upper bound on ICE gathering.
    pub gather_timeout: Duration,

    /// Encoder settings advertised in the track's codec parameters.
    pub encoder: EncoderConfig,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            gather_timeout: DEFAULT_GATHER_TIMEOUT,
            encoder: EncoderConfig::default(),
        }
    }
}

/// A session that completed negotiation.
#[derive(Debug, Clone)]
pub struct NegotiatedSession {
    /// Id of the new session.
    pub id: SessionId,

    /// Answer to return to the client.
    pub answer: SessionDescription,
}

/// Check that an offer is well formed and parse it.
pub fn validate_offer(offer: &SessionDescription) -> TransportResult<RTCSessionDescription> {
    if offer.sdp_type != SdpType::Offer {
        return Err(TransportError::MalformedOffer(format!(
            "expected an offer, got {:?}",
            offer.sdp_type
        )));
    }

    if offer.sdp.trim().is_empty() {
        return Err(TransportError::MalformedOffer("empty SDP".into()));
    }

    if !offer.has_ice_credentials() {
        warn!("Offer carries no ICE credentials (ice-ufrag)");
    }

    RTCSessionDescription::offer(offer.sdp.clone())
        .map_err(|e| TransportError::MalformedOffer(e.to_string()))
}

/// Creates sessions from client offers and attaches them to the sink.
pub struct SessionNegotiator {
    config: NegotiatorConfig,
    sink: Arc<BroadcastSink<EncodedPacket>>,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
}

impl SessionNegotiator {
    /// Create a negotiator. Every session's token is a child of `cancel`.
    pub fn new(
        config: NegotiatorConfig,
        sink: Arc<BroadcastSink<EncodedPacket>>,
        cancel: CancellationToken,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(Arc::clone(&sink)));
        Self {
            config,
            sink,
            registry,
            cancel,
        }
    }

    /// Live sessions.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Negotiate a new session from `offer`.
    ///
    /// Returns once ICE gathering has finished so the answer carries every
    /// candidate. On failure no session is left attached.
    #[instrument(name = "negotiate", skip_all)]
    pub async fn negotiate(&self, offer: SessionDescription) -> TransportResult<NegotiatedSession> {
        let offer = validate_offer(&offer)?;

        let id = self.sink.allocate_id();
        let pc = self.build_peer_connection().await?;
        let session = Arc::new(Session::new(id, pc, self.cancel.child_token()));
        self.registry.insert(Arc::clone(&session));

        debug!(session_id = %id, "Negotiating session");

        match self.complete(&session, offer).await {
            Ok(answer) => {
                self.activate(id)?;
                Ok(NegotiatedSession { id, answer })
            }
            Err(e) => {
                warn!(session_id = %id, "Negotiation failed: {}", e);
                self.registry.close(
                    id,
                    CloseReason::NegotiationFailed {
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Close a session on client request.
    pub fn close_session(&self, id: SessionId, reason: CloseReason) -> TransportResult<()> {
        if self.registry.close(id, reason) {
            Ok(())
        } else {
            Err(TransportError::SessionNotFound(id))
        }
    }

    /// Number of tracked sessions.
    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Close every session.
    pub fn shutdown(&self) {
        let closed = self.registry.close_all(CloseReason::Shutdown);
        info!(closed, "Closed all sessions");
    }

    /// Mark a negotiated session active. Fails if it closed while its
    /// candidates were being gathered.
    fn activate(&self, id: SessionId) -> TransportResult<()> {
        if self.registry.activate(id) {
            return Ok(());
        }

        warn!(session_id = %id, "Session closed before negotiation finished");
        Err(TransportError::Negotiation(format!(
            "session {id} closed during negotiation"
        )))
    }

    async fn build_peer_connection(&self) -> TransportResult<Arc<RTCPeerConnection>> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = if self.config.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.config.ice_servers.clone(),
                ..Default::default()
            }]
        };

        let config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        Ok(Arc::new(api.new_peer_connection(config).await?))
    }

    async fn complete(
        &self,
        session: &Arc<Session>,
        offer: RTCSessionDescription,
    ) -> TransportResult<SessionDescription> {
        let id = session.id();
        let pc = Arc::clone(session.peer_connection());

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: self.config.encoder.sample_rate,
                channels: self.config.encoder.channels,
                sdp_fmtp_line: self.config.encoder.sdp_fmtp_line(),
                rtcp_feedback: vec![],
            },
            "audio".to_owned(),
            "radio".to_owned(),
        ));

        let rtp_sender = pc
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;

        let packets = self.sink.attach(id);
        tokio::spawn(drain_feedback(
            id,
            rtp_sender,
            session.cancel_token().clone(),
        ));
        tokio::spawn(run_output_leg(
            Arc::clone(session),
            track,
            packets,
            Arc::downgrade(&self.registry),
        ));

        let registry = Arc::downgrade(&self.registry);
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            debug!(session_id = %id, %state, "Peer connection state changed");

            let reason = match state {
                RTCPeerConnectionState::Failed | RTCPeerConnectionState::Disconnected => {
                    Some(CloseReason::TransportFailed)
                }
                RTCPeerConnectionState::Closed => Some(CloseReason::TransportClosed),
                _ => None,
            };
            if let (Some(reason), Some(registry)) = (reason, registry.upgrade()) {
                registry.close(id, reason);
            }

            Box::pin(async {})
        }));

        pc.set_remote_description(offer).await?;
        let answer = pc.create_answer(None).await?;

        let mut gather_complete = pc.gathering_complete_promise().await;
        pc.set_local_description(answer).await?;

        tokio::time::timeout(self.config.gather_timeout, gather_complete.recv())
            .await
            .map_err(|_| TransportError::GatherTimeout(self.config.gather_timeout))?;

        let local = pc
            .local_description()
            .await
            .ok_or_else(|| TransportError::Negotiation("no local description".into()))?;

        Ok(SessionDescription {
            sdp_type: SdpType::Answer,
            sdp: local.sdp,
        })
    }
}
