//! Typed wire messages for the radio relay.
//!
//! This crate defines every message that crosses a component boundary:
//! HTTP request and response bodies, the notification stream, session and
//! source state machines, and the relay configuration.

mod commands;
mod events;
mod state;
mod types;

pub use commands::{GenreRequest, SdpType, SessionDescription};
pub use events::{Notification, Severity, UpdateMessage};
pub use state::{CloseReason, SessionState, SourceState};
pub use types::{
    AnswerResponse, CurrentGenre, ErrorBody, GenreChanged, NotifyAccepted, RelayConfig,
    RelayStats,
};

/// Per-subscriber queue depth for the notification stream.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 10;

/// Per-session queue depth for encoded audio packets.
pub const SESSION_CHANNEL_CAPACITY: usize = 50;
