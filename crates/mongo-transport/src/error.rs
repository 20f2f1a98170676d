//! Transport error types.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use mongo_tls::TlsError;
use thiserror::Error;

/// Errors that can occur on a transport.
///
/// Errors are `Clone` so a failure can be stored once and replayed to every
/// later caller. Wrapped I/O and TLS errors are shared behind `Arc`.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("failed to connect to {address}: {reason}")]
    Connect {
        /// Target address as `host:port`.
        address: String,
        /// Reason reported by the resolver or socket.
        reason: String,
    },

    /// Connecting took longer than the configured connect timeout.
    #[error("connecting to {address} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Target address as `host:port`.
        address: String,
        /// Configured connect timeout.
        timeout: Duration,
    },

    /// No inbound bytes arrived within the idle-read timeout while a read
    /// was pending.
    #[error("read timed out after {0:?} without inbound data")]
    ReadTimeout(Duration),

    /// IO error on the established connection.
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),

    /// TLS handshake or configuration failed.
    #[error("TLS error: {0}")]
    Tls(Arc<TlsError>),

    /// A blocking call stopped waiting before its operation completed.
    #[error("interrupted while waiting for completion")]
    InterruptedWait,

    /// The transport was closed.
    #[error("transport is closed")]
    Closed,

    /// The transport has not been opened yet.
    #[error("transport is not open")]
    NotOpen,

    /// `open` was called on a transport that was already opened.
    #[error("transport was already opened")]
    AlreadyOpen,

    /// A read was issued while another read was still pending.
    #[error("a read is already pending on this transport")]
    ReadAlreadyPending,

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TransportError {
    /// Check if this error is transient and the operation may succeed on a
    /// fresh connection.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::ConnectTimeout { .. } | Self::ReadTimeout(_) | Self::Io(_)
        )
    }

    /// Check if this is an idle-read timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ReadTimeout(_) | Self::ConnectTimeout { .. })
    }

    /// Check if this error reports a caller protocol violation rather than
    /// a connection problem.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::NotOpen | Self::AlreadyOpen | Self::ReadAlreadyPending | Self::Closed
        )
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(Arc::new(e))
    }
}

impl From<TlsError> for TransportError {
    fn from(e: TlsError) -> Self {
        Self::Tls(Arc::new(e))
    }
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
