//! Fan-out of items to a dynamic set of subscribers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Process-unique identifier of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Wrap a raw id.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s-{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("s-").unwrap_or(s).parse().map(Self)
    }
}

/// Outcome of one [`BroadcastSink::publish`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the item was queued for.
    pub delivered: usize,

    /// Subscribers detached because their queue was full.
    pub slow: Vec<SessionId>,

    /// Subscribers detached because their receiver was gone.
    pub closed: Vec<SessionId>,
}

impl PublishReport {
    /// Total subscribers detached by this publish.
    pub fn detached(&self) -> usize {
        self.slow.len() + self.closed.len()
    }
}

/// Single-producer fan-out point with drop-and-detach on overflow.
///
/// Each subscriber owns a bounded queue. [`publish`](Self::publish) never
/// waits: a subscriber whose queue is full is removed and its receiver sees
/// the channel close once drained.
pub struct BroadcastSink<T> {
    subscribers: Mutex<HashMap<SessionId, mpsc::Sender<T>>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl<T: Clone> BroadcastSink<T> {
    /// Create a sink whose subscribers buffer up to `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Reserve a fresh subscriber id.
    pub fn allocate_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Attach a subscriber and return its receiving end.
    ///
    /// Re-attaching an existing id replaces, and closes, the previous leg.
    pub fn attach(&self, id: SessionId) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.subscribers.lock().insert(id, tx).is_some() {
            debug!(subscriber = %id, "Replaced existing subscriber");
        }
        rx
    }

    /// Detach a subscriber. Returns false if it was not attached.
    pub fn detach(&self, id: SessionId) -> bool {
        self.subscribers.lock().remove(&id).is_some()
    }

    /// Queue `item` for every attached subscriber.
    pub fn publish(&self, item: T) -> PublishReport {
        let mut report = PublishReport::default();
        let mut subscribers = self.subscribers.lock();

        subscribers.retain(|id, tx| match tx.try_send(item.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = %id, "Subscriber queue full, detaching");
                report.slow.push(*id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = %id, "Subscriber gone, detaching");
                report.closed.push(*id);
                false
            }
        });

        report
    }

    /// Returns true if `id` is attached.
    pub fn contains(&self, id: SessionId) -> bool {
        self.subscribers.lock().contains_key(&id)
    }

    /// Number of attached subscribers.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Returns true if nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
