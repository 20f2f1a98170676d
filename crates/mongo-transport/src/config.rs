//! Transport configuration.

use std::time::Duration;

use mongo_tls::TlsConfig;

use crate::error::{Result, TransportError};

/// Default server port.
pub const DEFAULT_PORT: u16 = 27017;

/// Default size of each buffer the reader fills from the socket.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;

/// Default limit on inbound bytes queued while no read is pending.
pub const DEFAULT_MAX_BUFFERED: usize = 16 * 1024 * 1024;

/// Connection settings for a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port (default: 27017).
    pub port: u16,
    /// Time allowed for resolving and connecting (default: 10s).
    pub connect_timeout: Duration,
    /// Enable TCP keepalive (default: true).
    pub keepalive: bool,
    /// Socket send buffer size; the OS default when `None`.
    pub send_buffer_size: Option<u32>,
    /// Socket receive buffer size; the OS default when `None`.
    pub recv_buffer_size: Option<u32>,
    /// Idle-read timeout; `None` waits forever (default: 30s).
    ///
    /// Runs only while a read is pending and restarts on every inbound
    /// delivery.
    pub read_timeout: Option<Duration>,
    /// Wrap the connection in TLS (default: false).
    pub tls_enabled: bool,
    /// TLS settings used when `tls_enabled` is set.
    pub tls: TlsConfig,
    /// Capacity of each buffer the reader fills from the socket.
    pub read_chunk_size: usize,
    /// Queued inbound bytes at which the reader stops pulling from the
    /// socket until a read is issued (default: 16 MiB).
    ///
    /// A pending read always keeps the reader going, however large it is.
    pub max_buffered: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(10),
            keepalive: true,
            send_buffer_size: None,
            recv_buffer_size: None,
            read_timeout: Some(Duration::from_secs(30)),
            tls_enabled: false,
            tls: TlsConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_buffered: DEFAULT_MAX_BUFFERED,
        }
    }
}

impl TransportConfig {
    /// Create a configuration for `host:port` with default settings.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable TCP keepalive.
    #[must_use]
    pub fn keepalive(mut self, enabled: bool) -> Self {
        self.keepalive = enabled;
        self
    }

    /// Set the socket send buffer size.
    #[must_use]
    pub fn send_buffer_size(mut self, size: u32) -> Self {
        self.send_buffer_size = Some(size);
        self
    }

    /// Set the socket receive buffer size.
    #[must_use]
    pub fn recv_buffer_size(mut self, size: u32) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    /// Set or clear the idle-read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Enable or disable TLS.
    #[must_use]
    pub fn tls_enabled(mut self, enabled: bool) -> Self {
        self.tls_enabled = enabled;
        self
    }

    /// Enable or disable TLS hostname verification.
    #[must_use]
    pub fn tls_verify_hostname(mut self, verify: bool) -> Self {
        self.tls.verify_hostname = verify;
        self
    }

    /// Replace the TLS settings.
    #[must_use]
    pub fn with_tls_config(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    /// Set the reader's buffer capacity.
    #[must_use]
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set the inbound high-water mark.
    #[must_use]
    pub fn max_buffered(mut self, bytes: usize) -> Self {
        self.max_buffered = bytes;
        self
    }

    /// The target as `host:port`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reject settings no connection could use.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(TransportError::Config("host must not be empty".into()));
        }
        if self.read_chunk_size == 0 {
            return Err(TransportError::Config(
                "read chunk size must be non-zero".into(),
            ));
        }
        if self.max_buffered == 0 {
            return Err(TransportError::Config(
                "max buffered bytes must be non-zero".into(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(TransportError::Config(
                "connect timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.keepalive);
        assert!(!config.tls_enabled);
        assert!(config.tls.verify_hostname);
        assert_eq!(config.max_buffered, DEFAULT_MAX_BUFFERED);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TransportConfig::new("db.internal", 27018)
            .tls_enabled(true)
            .tls_verify_hostname(false)
            .read_timeout(None)
            .recv_buffer_size(1 << 16);
        assert_eq!(config.address(), "db.internal:27018");
        assert!(config.tls_enabled);
        assert!(!config.tls.verify_hostname);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.recv_buffer_size, Some(65536));
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let config = TransportConfig::new("", 1);
        assert!(matches!(config.validate(), Err(TransportError::Config(_))));
        let config = TransportConfig::default().read_chunk_size(0);
        assert!(matches!(config.validate(), Err(TransportError::Config(_))));
        let config = TransportConfig::default().max_buffered(0);
        assert!(matches!(config.validate(), Err(TransportError::Config(_))));
    }
}
