//! Core engine for the radio relay.
//!
//! This crate wires the frame source, encoder and broadcast sink into a
//! paced pipeline, and owns the genre control surface and the notification
//! hub that the HTTP layer exposes.

mod control;
mod error;
mod metrics;
mod notify;
mod pipeline;
mod relay;

pub use control::GenreControl;
pub use error::{ControlError, EngineError};
pub use metrics::MetricsCollector;
pub use notify::NotificationHub;
pub use pipeline::Pipeline;
pub use relay::Relay;

use std::time::Duration;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// How often the pipeline logs a stats line.
pub const STATS_LOG_INTERVAL: Duration = Duration::from_secs(5);
