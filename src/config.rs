//! Configuration and limits for WebSocket connections.

use std::time::Duration;

/// Resource limits for WebSocket connections.
///
/// These bound memory usage against misbehaving peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a complete message after reassembly.
    ///
    /// Default: 64 MB
    pub max_message_size: usize,

    /// Maximum payload size of a single frame.
    ///
    /// Enforced against the declared length as soon as the frame header is
    /// read, before any payload is buffered.
    ///
    /// Default: 16 MB
    pub max_frame_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of handshake data in bytes.
    ///
    /// Default: 8 KB
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024 * 1024,
            max_frame_size: 16 * 1024 * 1024,
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(
        max_message_size: usize,
        max_frame_size: usize,
        max_fragment_count: usize,
        max_handshake_size: usize,
    ) -> Self {
        Self {
            max_message_size,
            max_frame_size,
            max_fragment_count,
            max_handshake_size,
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bound on establishing the TCP connection and on waiting for the
    /// handshake response.
    ///
    /// Default: 3 seconds
    pub connect_timeout: Duration,

    /// Bound on a server waiting for a client's handshake request.
    ///
    /// Default: 3 seconds
    pub handshake_timeout: Duration,

    /// Resource limits.
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(3),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration for client connections.
    #[must_use]
    pub fn client() -> Self {
        Self::default()
    }

    /// Default configuration for server connections.
    #[must_use]
    pub fn server() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the connect/handshake-response timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_message_size, 64 * 1024 * 1024);
        assert_eq!(limits.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(limits.max_fragment_count, 128);
        assert_eq!(limits.max_handshake_size, 8192);
    }

    #[test]
    fn test_default_timeouts() {
        let config = Config::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.handshake_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_check_message_size() {
        let limits = Limits::new(100, 100, 4, 1024);
        assert!(limits.check_message_size(100).is_ok());
        assert!(matches!(
            limits.check_message_size(101),
            Err(crate::Error::MessageTooLarge { size: 101, max: 100 })
        ));
    }

    #[test]
    fn test_check_fragment_count() {
        let limits = Limits::new(1024, 1024, 4, 1024);
        assert!(limits.check_fragment_count(4).is_ok());
        assert!(matches!(
            limits.check_fragment_count(5),
            Err(crate::Error::TooManyFragments { count: 5, max: 4 })
        ));
    }

    #[test]
    fn test_builder() {
        let config = Config::client()
            .with_limits(Limits::new(10, 10, 2, 512))
            .with_connect_timeout(Duration::from_secs(1));
        assert_eq!(config.limits.max_message_size, 10);
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }
}
