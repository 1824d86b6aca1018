//! Metrics collection and reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use radio_ipc::RelayStats;

/// Collects relay counters.
pub struct MetricsCollector {
    start_time: RwLock<Option<Instant>>,
    frames_read: AtomicU64,
    packets_published: AtomicU64,
    encode_drops: AtomicU64,
    slow_session_drops: AtomicU64,
    bytes_encoded: AtomicU64,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            start_time: RwLock::new(None),
            frames_read: AtomicU64::new(0),
            packets_published: AtomicU64::new(0),
            encode_drops: AtomicU64::new(0),
            slow_session_drops: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
        }
    }

    /// Start metrics collection.
    pub fn start(&self) {
        *self.start_time.write() = Some(Instant::now());
    }

    /// Stop metrics collection.
    pub fn stop(&self) {
        *self.start_time.write() = None;
    }

    /// Record a raw frame read from the producer.
    pub fn record_frame_read(&self) {
        self.frames_read.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an encoded packet handed to the sink.
    pub fn record_packet(&self, bytes: usize) {
        self.packets_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record an encode drop.
    pub fn record_encode_drop(&self) {
        self.encode_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record sessions detached for falling behind.
    pub fn record_slow_drops(&self, count: usize) {
        if count > 0 {
            self.slow_session_drops
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    /// Packets published so far.
    pub fn packets_published(&self) -> u64 {
        self.packets_published.load(Ordering::Relaxed)
    }

    /// Get current counters. Fields owned by other components are left at
    /// their defaults for the caller to fill in.
    pub fn snapshot(&self) -> RelayStats {
        let now = Instant::now();
        let start = *self.start_time.read();

        let bytes = self.bytes_encoded.load(Ordering::Relaxed);
        let (uptime_seconds, bitrate_kbps) = match start {
            Some(start) => {
                let elapsed = now.duration_since(start).as_secs_f64();
                let bitrate = if elapsed > 0.0 {
                    ((bytes * 8) as f64 / elapsed / 1000.0) as u32
                } else {
                    0
                };
                (now.duration_since(start).as_secs(), bitrate)
            }
            None => (0, 0),
        };

        RelayStats {
            frames_read: self.frames_read.load(Ordering::Relaxed),
            packets_published: self.packets_published.load(Ordering::Relaxed),
            encode_drops: self.encode_drops.load(Ordering::Relaxed),
            slow_session_drops: self.slow_session_drops.load(Ordering::Relaxed),
            bytes_encoded: bytes,
            bitrate_kbps,
            uptime_seconds,
            ..RelayStats::default()
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = MetricsCollector::new();
        metrics.start();

        metrics.record_frame_read();
        metrics.record_frame_read();
        metrics.record_packet(100);
        metrics.record_encode_drop();
        metrics.record_slow_drops(0);
        metrics.record_slow_drops(2);

        let stats = metrics.snapshot();
        assert_eq!(stats.frames_read, 2);
        assert_eq!(stats.packets_published, 1);
        assert_eq!(stats.bytes_encoded, 100);
        assert_eq!(stats.encode_drops, 1);
        assert_eq!(stats.slow_session_drops, 2);
    }

    #[test]
    fn test_stopped_collector_reports_no_uptime() {
        let metrics = MetricsCollector::new();
        metrics.record_packet(4000);

        let stats = metrics.snapshot();
        assert_eq!(stats.uptime_seconds, 0);
        assert_eq!(stats.bitrate_kbps, 0);
    }
}
