//! Reconnection policy for the producer endpoint.

use std::time::Duration;

use crate::DEFAULT_RECONNECT_DELAY_MS;

/// Fixed delay between attempts to open the producer endpoint. Attempts
/// never stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS))
    }
}

impl ReconnectPolicy {
    /// Retry forever, waiting `delay` after each failed attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay before the next attempt.
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delay() {
        assert_eq!(ReconnectPolicy::default().delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_fixed_delay() {
        let policy = ReconnectPolicy::fixed(Duration::from_millis(250));
        assert_eq!(policy.delay(), Duration::from_millis(250));
    }
}
