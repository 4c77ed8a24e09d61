//! Transport configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::trace::{Silent, TraceSink};
use crate::{DEFAULT_IDLE_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};

/// Settings for an [`RtuOverTcpTransport`](crate::RtuOverTcpTransport).
///
/// Set before the transport is built; the transport keeps its own copy.
#[derive(Clone)]
pub struct TransportConfig {
    /// Bound for one write+read round trip. Zero disables the deadline.
    pub request_timeout: Duration,
    /// Inactivity period after which the connection is closed. Zero disables
    /// the idle close.
    pub idle_timeout: Duration,
    /// Sink for `sending`/`received` hex traces.
    pub trace: Arc<dyn TraceSink>,
}

impl TransportConfig {
    /// Creates a configuration with the default timeouts and no tracing.
    pub fn new() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            trace: Arc::new(Silent),
        }
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the trace sink.
    pub fn with_trace(mut self, trace: Arc<dyn TraceSink>) -> Self {
        self.trace = trace;
        self
    }

    /// Returns the request deadline, or `None` when disabled.
    pub fn request_deadline(&self) -> Option<Duration> {
        (!self.request_timeout.is_zero()).then_some(self.request_timeout)
    }

    /// Returns the idle timeout, or `None` when disabled.
    pub fn idle_deadline(&self) -> Option<Duration> {
        (!self.idle_timeout.is_zero()).then_some(self.idle_timeout)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("request_timeout", &self.request_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert_eq!(config.request_deadline(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_disables() {
        let config = TransportConfig::new()
            .with_request_timeout(Duration::ZERO)
            .with_idle_timeout(Duration::ZERO);
        assert_eq!(config.request_deadline(), None);
        assert_eq!(config.idle_deadline(), None);
    }
}
