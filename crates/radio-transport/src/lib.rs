//! Broadcast fan-out and WebRTC session transport.
//!
//! This crate provides the [`BroadcastSink`] that delivers every encoded
//! packet to every attached session, and the [`SessionNegotiator`] that turns
//! a client's SDP offer into a live session attached to that sink.

mod error;
mod negotiator;
mod session;
mod sink;

pub use error::TransportError;
pub use negotiator::{validate_offer, NegotiatedSession, NegotiatorConfig, SessionNegotiator};
pub use session::{Session, SessionRegistry};
pub use sink::{BroadcastSink, PublishReport, SessionId};

use std::time::Duration;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Default upper bound on ICE gathering.
pub const DEFAULT_GATHER_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffer for one incoming RTCP read.
pub const FEEDBACK_BUFFER_SIZE: usize = 1500;
