//! Client playback sessions and their lifetime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use radio_encoder::EncodedPacket;
use radio_ipc::{CloseReason, SessionState};

use crate::sink::{BroadcastSink, SessionId};
use crate::FEEDBACK_BUFFER_SIZE;

/// One client's negotiated playback connection.
pub struct Session {
    id: SessionId,
    peer_connection: Arc<RTCPeerConnection>,
    state: RwLock<SessionState>,
    cancel: CancellationToken,
    created_at: Instant,
}

impl Session {
    /// Create a session in the negotiating state.
    pub fn new(
        id: SessionId,
        peer_connection: Arc<RTCPeerConnection>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            peer_connection,
            state: RwLock::new(SessionState::Negotiating),
            cancel,
            created_at: Instant::now(),
        }
    }

    /// Session id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Time since the offer arrived.
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Token cancelled when the session closes.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Underlying peer connection.
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    /// Move to `new_state`. Closed is terminal, so this returns false once
    /// the session has closed.
    pub fn transition_to(&self, new_state: SessionState) -> bool {
        let previous = {
            let mut state = self.state.write();
            if state.is_closed() {
                return false;
            }
            std::mem::replace(&mut *state, new_state.clone())
        };

        debug!(
            session_id = %self.id,
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        if new_state.is_closed() {
            self.cancel.cancel();
        }
        true
    }
}

/// Live sessions and the sink they are attached to.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
    sink: Arc<BroadcastSink<EncodedPacket>>,
    opened: AtomicU64,
    closed: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry over `sink`.
    pub fn new(sink: Arc<BroadcastSink<EncodedPacket>>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sink,
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
        }
    }

    /// Track a newly created session.
    pub fn insert(&self, session: Arc<Session>) {
        self.sessions.lock().insert(session.id(), session);
    }

    /// Look up a session.
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Mark a session active.
    pub fn activate(&self, id: SessionId) -> bool {
        let Some(session) = self.get(id) else {
            return false;
        };
        if session.transition_to(SessionState::Active) {
            self.opened.fetch_add(1, Ordering::Relaxed);
            info!(session_id = %id, elapsed = ?session.age(), "Session active");
            true
        } else {
            false
        }
    }

    /// Close a session: detach it from the sink, stop its tasks and release
    /// the peer connection in the background. Returns false if the session
    /// was unknown or already closed.
    pub fn close(&self, id: SessionId, reason: CloseReason) -> bool {
        let Some(session) = self.sessions.lock().remove(&id) else {
            return false;
        };

        self.sink.detach(id);

        if !session.transition_to(SessionState::Closed {
            reason: reason.clone(),
        }) {
            return false;
        }

        self.closed.fetch_add(1, Ordering::Relaxed);
        info!(session_id = %id, reason = %reason.message(), "Session closed");

        let pc = Arc::clone(session.peer_connection());
        tokio::spawn(async move {
            if let Err(e) = pc.close().await {
                debug!(session_id = %id, "Peer connection close failed: {}", e);
            }
        });
        true
    }

    /// Close every session with the same reason.
    pub fn close_all(&self, reason: CloseReason) -> usize {
        let ids: Vec<SessionId> = self.sessions.lock().keys().copied().collect();
        ids.into_iter()
            .filter(|id| self.close(*id, reason.clone()))
            .count()
    }

    /// Sessions currently tracked, negotiating or active.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Returns true if no session is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sessions that reached the active state since start.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Sessions closed since start.
    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Relaxed)
    }
}

/// Write packets from the sink to the session's track until the session is
/// cancelled or the sink drops the leg.
pub(crate) async fn run_output_leg(
    session: Arc<Session>,
    track: Arc<TrackLocalStaticSample>,
    mut packets: mpsc::Receiver<EncodedPacket>,
    registry: Weak<SessionRegistry>,
) {
    let id = session.id();
    let cancel = session.cancel_token().clone();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            packet = packets.recv() => {
                let Some(packet) = packet else {
                    // The sink only drops a live leg when its queue overflowed.
                    if let Some(registry) = registry.upgrade() {
                        registry.close(id, CloseReason::SlowConsumer);
                    }
                    break;
                };

                let sample = Sample {
                    data: packet.data,
                    duration: packet.duration,
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    trace!(session_id = %id, "Sample write failed: {}", e);
                }
            }
        }
    }

    debug!(session_id = %id, "Output leg stopped");
}

/// Read and discard RTCP feedback for the life of the session.
pub(crate) async fn drain_feedback(id: SessionId, sender: Arc<RTCRtpSender>, cancel: CancellationToken) {
    let mut buf = vec![0u8; FEEDBACK_BUFFER_SIZE];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = sender.read(&mut buf) => {
                if let Err(e) = result {
                    trace!(session_id = %id, "Feedback channel ended: {}", e);
                    break;
                }
            }
        }
    }

    debug!(session_id = %id, "Feedback drain stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::api::APIBuilder;
    use webrtc::peer_connection::configuration::RTCConfiguration;

    async fn peer_connection() -> Arc<RTCPeerConnection> {
        let api = APIBuilder::new().build();
        Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_closed_is_terminal() {
        let session = Session::new(SessionId::new(1), peer_connection().await, CancellationToken::new());

        assert!(session.transition_to(SessionState::Active));
        assert!(session.transition_to(SessionState::Closed {
            reason: CloseReason::ClientTeardown,
        }));
        assert!(session.cancel_token().is_cancelled());
        assert!(!session.transition_to(SessionState::Active));
        assert!(session.state().is_closed());
    }

    #[tokio::test]
    async fn test_close_detaches_from_sink() {
        let sink = Arc::new(BroadcastSink::new(8));
        let registry = SessionRegistry::new(Arc::clone(&sink));
        let id = sink.allocate_id();
        let _rx = sink.attach(id);

        let session = Arc::new(Session::new(id, peer_connection().await, CancellationToken::new()));
        registry.insert(Arc::clone(&session));
        assert!(registry.activate(id));

        assert!(registry.close(id, CloseReason::ClientTeardown));
        assert!(!sink.contains(id));
        assert!(registry.is_empty());
        assert!(session.cancel_token().is_cancelled());
        assert_eq!(registry.opened(), 1);
        assert_eq!(registry.closed(), 1);

        // Second close is a no-op.
        assert!(!registry.close(id, CloseReason::ClientTeardown));
        assert_eq!(registry.closed(), 1);
    }

    #[tokio::test]
    async fn test_sink_overflow_closes_session() {
        let sink = Arc::new(BroadcastSink::new(1));
        let registry = Arc::new(SessionRegistry::new(Arc::clone(&sink)));
        let id = sink.allocate_id();
        let rx = sink.attach(id);

        let session = Arc::new(Session::new(id, peer_connection().await, CancellationToken::new()));
        registry.insert(Arc::clone(&session));

        // Detaching from the sink closes the leg, as an overflow would.
        sink.detach(id);

        let track = Arc::new(TrackLocalStaticSample::new(
            webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability {
                mime_type: webrtc::api::media_engine::MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_owned(),
            "test".to_owned(),
        ));
        run_output_leg(Arc::clone(&session), track, rx, Arc::downgrade(&registry)).await;

        assert_eq!(
            session.state(),
            SessionState::Closed {
                reason: CloseReason::SlowConsumer
            }
        );
        assert!(registry.is_empty());
    }
}
