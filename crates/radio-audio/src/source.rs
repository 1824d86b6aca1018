//! Reconnecting reader over the producer's PCM endpoint.

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tracing::{debug, info, instrument, trace, warn};

use radio_ipc::SourceState;

use crate::error::AudioError;
use crate::frame::{FrameFormat, RawFrame};
use crate::policy::ReconnectPolicy;
use crate::AudioResult;

/// An open producer endpoint.
///
/// FIFOs are read through the runtime's reactor so a pending open or read
/// is dropped on cancellation instead of pinning a blocking thread.
enum Endpoint {
    Fifo(pipe::Receiver),
    File(File),
}

impl Endpoint {
    async fn open(path: &Path) -> std::io::Result<Self> {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.file_type().is_fifo() {
            // Read-only so a departed producer still shows up as EOF.
            let receiver = pipe::OpenOptions::new().open_receiver(path)?;
            Ok(Self::Fifo(receiver))
        } else {
            Ok(Self::File(File::open(path).await?))
        }
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Self::Fifo(receiver) => receiver.read_exact(buf).await.map(|_| ()),
            Self::File(file) => file.read_exact(buf).await.map(|_| ()),
        }
    }
}

/// Shared view of a [`FrameSource`]'s connection health.
#[derive(Debug, Clone, Default)]
pub struct SourceStatus {
    state: Arc<RwLock<SourceState>>,
    reconnects: Arc<AtomicU64>,
}

impl SourceStatus {
    /// Current connection state.
    pub fn state(&self) -> SourceState {
        *self.state.read()
    }

    /// Times the endpoint was reopened after the first successful open.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    fn set(&self, state: SourceState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(previous = %previous.message(), current = %state.message(), "Source state transition");
        }
    }
}

/// Produces an endless sequence of [`RawFrame`]s from a producer endpoint.
///
/// The endpoint is opened lazily and open failures are retried forever,
/// waiting the [`ReconnectPolicy`] delay between attempts. A read failure or
/// EOF mid-frame drops the handle and the partially read bytes, then reopens.
pub struct FrameSource {
    path: PathBuf,
    format: FrameFormat,
    policy: ReconnectPolicy,
    reader: Option<Endpoint>,
    frames_on_handle: u64,
    opened_once: bool,
    sequence: u64,
    status: SourceStatus,
}

impl FrameSource {
    /// Create a source for the endpoint at `path`. Nothing is opened yet.
    pub fn new(path: impl AsRef<Path>, format: FrameFormat, policy: ReconnectPolicy) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            policy,
            reader: None,
            frames_on_handle: 0,
            opened_once: false,
            sequence: 0,
            status: SourceStatus::default(),
        }
    }

    /// Endpoint path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Frame format read from the endpoint.
    pub fn format(&self) -> &FrameFormat {
        &self.format
    }

    /// Handle for observing connection health from other tasks.
    pub fn status(&self) -> SourceStatus {
        self.status.clone()
    }

    /// Wait for the next complete frame.
    ///
    /// Producer outages never surface here: they are absorbed by reopening.
    /// Only an error that is not a reconnect signal is returned, and the
    /// handle stays open in that case.
    pub async fn next_frame(&mut self) -> AudioResult<RawFrame> {
        loop {
            let mut endpoint = match self.reader.take() {
                Some(endpoint) => endpoint,
                None => self.open_with_retry().await,
            };

            match self.read_frame(&mut endpoint).await {
                Ok(frame) => {
                    self.reader = Some(endpoint);
                    self.frames_on_handle += 1;
                    return Ok(frame);
                }
                Err(e) if !e.is_reconnect() => {
                    self.reader = Some(endpoint);
                    return Err(e);
                }
                Err(e) => {
                    warn!("{}, reconnecting", e);
                    self.status.set(SourceState::Disconnected);

                    // A handle that never produced a frame would spin on reopen.
                    if self.frames_on_handle == 0 {
                        tokio::time::sleep(self.policy.delay()).await;
                    }
                }
            }
        }
    }

    #[instrument(name = "source_open", skip_all, fields(path = %self.path.display()))]
    async fn open_with_retry(&mut self) -> Endpoint {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match Endpoint::open(&self.path).await {
                Ok(endpoint) => {
                    if self.opened_once {
                        self.status.reconnects.fetch_add(1, Ordering::Relaxed);
                    }
                    self.opened_once = true;
                    self.frames_on_handle = 0;
                    self.status.set(SourceState::Connected);
                    info!(attempt, "Producer endpoint opened");
                    return endpoint;
                }
                Err(source) => {
                    let error = AudioError::OpenFailed {
                        path: self.path.clone(),
                        source,
                    };

                    let delay = self.policy.delay();
                    self.status.set(SourceState::Waiting { attempt });
                    warn!("Connection attempt {} failed: {}", attempt, error);
                    info!("Reconnecting in {:?}...", delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn read_frame(&mut self, endpoint: &mut Endpoint) -> AudioResult<RawFrame> {
        let mut buf = vec![0u8; self.format.bytes_per_frame()];
        endpoint
            .read_exact(&mut buf)
            .await
            .map_err(AudioError::StreamInterrupted)?;

        let frame = RawFrame::new(Bytes::from(buf), self.sequence, &self.format)?;
        self.sequence += 1;

        trace!(sequence = frame.sequence, "Frame read");
        Ok(frame)
    }
}
