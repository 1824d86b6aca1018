//! Current-genre state and the producer signal file.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::ControlError;

/// Holds the current genre and tells the producer when it changes.
///
/// The in-memory value is updated before the signal file is written, so a
/// failed write still leaves the new genre visible through [`genre`](Self::genre).
pub struct GenreControl {
    current: RwLock<String>,
    signal_path: PathBuf,
    prefix: String,
    /// Serializes signal writes so the file ends up matching the last update.
    write_lock: tokio::sync::Mutex<()>,
}

impl GenreControl {
    /// Create a control starting at `default_genre`.
    pub fn new(
        default_genre: impl Into<String>,
        signal_path: impl AsRef<Path>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            current: RwLock::new(default_genre.into()),
            signal_path: signal_path.as_ref().to_path_buf(),
            prefix: prefix.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The current genre.
    pub fn genre(&self) -> String {
        self.current.read().clone()
    }

    /// Contents written to the signal file for `genre`.
    pub fn directive(&self, genre: &str) -> String {
        format!("{}{}", self.prefix, genre)
    }

    /// Set the current genre and write the producer signal.
    ///
    /// Any string is accepted verbatim.
    pub async fn set_genre(&self, genre: &str) -> Result<(), ControlError> {
        let _guard = self.write_lock.lock().await;

        let previous = std::mem::replace(&mut *self.current.write(), genre.to_string());

        if let Err(source) = tokio::fs::write(&self.signal_path, self.directive(genre)).await {
            warn!(
                genre,
                path = %self.signal_path.display(),
                "Failed to write genre signal: {}",
                source
            );
            return Err(ControlError::SignalWrite {
                path: self.signal_path.clone(),
                source,
            });
        }

        info!(%previous, current = genre, "Genre changed");
        Ok(())
    }
}
