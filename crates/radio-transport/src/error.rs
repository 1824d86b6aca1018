//! Error types for the transport module.

use std::time::Duration;

use thiserror::Error;

use crate::sink::SessionId;

/// Errors that can occur while negotiating or managing sessions.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client's offer is not a usable session description.
    #[error("Malformed offer: {0}")]
    MalformedOffer(String),

    /// Negotiation failed after the offer was accepted.
    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    /// Error from the WebRTC stack.
    #[error("WebRTC error: {0}")]
    WebRtc(#[from] webrtc::Error),

    /// ICE gathering did not complete in time.
    #[error("ICE gathering did not complete within {0:?}")]
    GatherTimeout(Duration),

    /// No session with this id.
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),
}

impl TransportError {
    /// Returns true if the request itself was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedOffer(_) | Self::SessionNotFound(_))
    }
}
