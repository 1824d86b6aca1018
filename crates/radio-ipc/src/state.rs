//! Session and source state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle of one client playback session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Offer received, answer not yet returned.
    #[default]
    Negotiating,

    /// Answer returned, packets flowing.
    Active,

    /// Session torn down. Terminal.
    Closed {
        /// Why the session ended.
        reason: CloseReason,
    },
}

impl SessionState {
    /// Returns true while negotiation is in progress.
    pub fn is_negotiating(&self) -> bool {
        matches!(self, Self::Negotiating)
    }

    /// Returns true if the session is active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Returns true if the session has closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Negotiating => "Negotiating",
            Self::Active => "Active",
            Self::Closed { .. } => "Closed",
        }
    }
}

/// Reason a session was closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// Client asked for teardown.
    ClientTeardown,

    /// Transport reported failure or disconnect.
    TransportFailed,

    /// Transport closed normally.
    TransportClosed,

    /// Output leg could not keep up and was dropped by the sink.
    SlowConsumer,

    /// Negotiation did not complete.
    NegotiationFailed { message: String },

    /// Relay is shutting down.
    Shutdown,
}

impl CloseReason {
    /// Returns a display message for this reason.
    pub fn message(&self) -> String {
        match self {
            Self::ClientTeardown => "Closed by client".to_string(),
            Self::TransportFailed => "Transport failed".to_string(),
            Self::TransportClosed => "Transport closed".to_string(),
            Self::SlowConsumer => "Dropped as a slow consumer".to_string(),
            Self::NegotiationFailed { message } => format!("Negotiation failed: {message}"),
            Self::Shutdown => "Relay shutting down".to_string(),
        }
    }
}

/// Connection state of the upstream PCM producer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceState {
    /// No handle open.
    #[default]
    Disconnected,

    /// Waiting to retry opening the producer endpoint.
    Waiting { attempt: u32 },

    /// Reading frames.
    Connected,
}

impl SourceState {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Get status message.
    pub fn message(&self) -> String {
        match self {
            Self::Disconnected => "Disconnected".to_string(),
            Self::Waiting { attempt } => format!("Waiting for producer (attempt {attempt})"),
            Self::Connected => "Connected".to_string(),
        }
    }
}
