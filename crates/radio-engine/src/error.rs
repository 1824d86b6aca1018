//! Error types for the engine.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use radio_encoder::EncoderError;
use radio_transport::TransportError;

/// Errors from the genre control surface.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The signal file could not be written. The in-memory genre has
    /// already been updated.
    #[error("Failed to write genre signal to {}: {source}", path.display())]
    SignalWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur while running the relay.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Encoder could not be constructed.
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// Session transport error.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Genre control error.
    #[error("Control error: {0}")]
    Control(#[from] ControlError),
}
