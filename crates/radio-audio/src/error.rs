//! Error types for the audio module.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading audio frames.
#[derive(Debug, Error)]
pub enum AudioError {
    /// The producer endpoint could not be opened.
    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The producer went away mid-stream. The current handle must be reopened.
    #[error("Producer stream interrupted: {0}")]
    StreamInterrupted(#[source] io::Error),

    /// A buffer does not hold a whole number of frames or samples.
    #[error("Invalid frame format: {0}")]
    InvalidFormat(String),
}

impl AudioError {
    /// Returns true if the owning loop should drop its handle and reconnect.
    pub fn is_reconnect(&self) -> bool {
        matches!(self, Self::StreamInterrupted(_) | Self::OpenFailed { .. })
    }
}
