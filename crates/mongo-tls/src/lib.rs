//! # mongo-tls
//!
//! TLS client layer for document-store connections.
//!
//! The transport performs the handshake right after the TCP connect, before
//! any document traffic:
//!
//! ```text
//! TCP Connect → TLS Handshake → documents (encrypted)
//! ```
//!
//! ## Features
//!
//! - TLS 1.2 and TLS 1.3 support via rustls
//! - Server certificate validation against the Mozilla roots or custom roots
//! - Hostname verification, on by default
//!
//! ## Security
//!
//! Turning hostname verification off keeps chain validation but accepts a
//! certificate issued for any name. A warning is logged when a connector is
//! built that way.
//!
//! ```rust,ignore
//! use mongo_tls::{TlsConfig, TlsConnector, TlsVersion};
//!
//! let connector = TlsConnector::new(
//!     TlsConfig::new()
//!         .verify_hostname(false)
//!         .min_protocol_version(TlsVersion::Tls13),
//! )?;
//! let stream = connector.connect(tcp, "db.internal").await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod connector;
pub mod error;

pub use config::{TlsConfig, TlsVersion};
pub use connector::TlsConnector;
pub use error::TlsError;

// Re-export tokio-rustls stream type for convenience
pub use tokio_rustls::client::TlsStream;
