//! Client configuration

use std::time::Duration;

/// Reconnection policy after a connection loss
///
/// This client never reconnects on its own; after a connection fault the
/// caller decides whether to issue a fresh `connect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Never reconnect automatically (caller-driven recovery)
    #[default]
    Never,
}

/// MELSEC client configuration
///
/// Immutable after construction. Built with [`ClientConfig::new`] plus the
/// `with_*` methods for non-default values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Remote device hostname or IP address
    pub address: String,
    /// Remote device port
    pub port: u16,
    /// Maximum time to wait for a response to a sent request
    pub request_timeout: Duration,
    /// Maximum time to wait for the TCP connection to establish
    pub connect_timeout: Duration,
    /// Reconnection policy after a connection loss
    pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a configuration with default timeouts
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::Never,
        }
    }

    /// Set the per-request response timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connection establishment timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::new("192.168.1.10", 5007);
        assert_eq!(config.address, "192.168.1.10");
        assert_eq!(config.port, 5007);
        assert_eq!(config.request_timeout, ClientConfig::DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.connect_timeout, ClientConfig::DEFAULT_CONNECT_TIMEOUT);
        assert_eq!(config.reconnect, ReconnectPolicy::Never);
    }

    #[test]
    fn test_config_with_timeouts() {
        let config = ClientConfig::new("10.0.0.1", 5007)
            .with_request_timeout(Duration::from_millis(200))
            .with_connect_timeout(Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_millis(200));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
    }
}
