//! Common types used across the relay.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::state::SourceState;
use crate::{NOTIFICATION_CHANNEL_CAPACITY, SESSION_CHANNEL_CAPACITY};

/// Relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP listen address.
    pub listen_addr: SocketAddr,

    /// Path of the FIFO the producer writes PCM into.
    pub pipe_path: String,

    /// Path of the file the producer polls for genre changes.
    pub signal_path: String,

    /// Token written before the genre name in the signal file.
    pub signal_prefix: String,

    /// Genre reported before any change is requested.
    pub default_genre: String,

    /// STUN/TURN server URLs.
    pub ice_servers: Vec<String>,

    /// Delay between attempts to open the producer endpoint, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Opus target bitrate in kbps.
    pub bitrate_kbps: u32,

    /// Opus complexity (0-10).
    pub complexity: u8,

    /// Whether Opus in-band forward error correction is enabled.
    pub inband_fec: bool,

    /// Expected packet loss percentage the encoder tunes FEC for.
    pub packet_loss_percent: u8,

    /// Encoded packets buffered per session before the session is dropped.
    pub session_queue_capacity: usize,

    /// Notifications buffered per subscriber before it is dropped.
    pub notification_queue_capacity: usize,

    /// Upper bound on ICE gathering, in milliseconds.
    pub gather_timeout_ms: u64,
}

impl RelayConfig {
    /// Delay between producer open attempts.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Upper bound on ICE gathering.
    pub fn gather_timeout(&self) -> Duration {
        Duration::from_millis(self.gather_timeout_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            pipe_path: "/tmp/audio_pipe".to_string(),
            signal_path: "/tmp/genre_request.txt".to_string(),
            signal_prefix: "SMOOTH:".to_string(),
            default_genre: "lofi hip hop".to_string(),
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            reconnect_delay_ms: 2000,
            bitrate_kbps: 128,
            complexity: 8,
            inband_fec: true,
            packet_loss_percent: 5,
            session_queue_capacity: SESSION_CHANNEL_CAPACITY,
            notification_queue_capacity: NOTIFICATION_CHANNEL_CAPACITY,
            gather_timeout_ms: 10_000,
        }
    }
}

/// Answer returned from `POST /offer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    /// Always "answer".
    #[serde(rename = "type")]
    pub sdp_type: String,

    /// Answer SDP including all gathered candidates.
    pub sdp: String,

    /// Identifier of the created session.
    pub session_id: String,
}

/// Response to a successful genre change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreChanged {
    /// Always "success".
    pub status: String,

    /// The genre now requested.
    pub genre: String,
}

/// Response to `GET /current-genre`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentGenre {
    /// The current genre.
    pub genre: String,
}

/// Response to `POST /notify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyAccepted {
    /// Always "success".
    pub status: String,

    /// Subscribers the notification was queued for.
    pub delivered: usize,
}

/// Error body for any failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error message.
    pub error: String,
}

/// Snapshot of relay counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayStats {
    /// Raw frames read from the producer.
    pub frames_read: u64,

    /// Encoded packets handed to the broadcast sink.
    pub packets_published: u64,

    /// Frames skipped because encoding failed.
    pub encode_drops: u64,

    /// Sessions detached because their queue was full.
    pub slow_session_drops: u64,

    /// Total encoded bytes produced.
    pub bytes_encoded: u64,

    /// Times the producer endpoint was reopened.
    pub source_reconnects: u64,

    /// Sessions successfully negotiated since start.
    pub sessions_opened: u64,

    /// Sessions closed since start.
    pub sessions_closed: u64,

    /// Sessions currently attached.
    pub active_sessions: usize,

    /// Average encoded bitrate since start, in kbps.
    pub bitrate_kbps: u32,

    /// Current producer connection state.
    pub source_state: SourceState,

    /// Current genre.
    pub genre: String,

    /// Relay uptime in seconds.
    pub uptime_seconds: u64,
}
