//! # mongo-transport
//!
//! Asynchronous duplex byte transport for a document-store connection.
//!
//! The transport turns irregular inbound network chunks into exact-length
//! reads. Each chunk is queued as an owned [`bytes::Bytes`] region; a read
//! of `n` bytes takes whole regions from the head of the queue and splits
//! the last one if it only needs part of it. The split shares storage, so
//! reassembly never copies payload bytes.
//!
//! ## Rules
//!
//! - At most one read is pending. A second read fails fast with
//!   [`TransportError::ReadAlreadyPending`].
//! - The first I/O failure is stored and replayed to every later read and
//!   write. An idle-read timeout is reported as
//!   [`TransportError::ReadTimeout`], distinct from other I/O failures.
//! - While no read is pending, the reader stops pulling from the socket once
//!   [`TransportConfig::max_buffered`] bytes are queued.
//! - [`Transport::close`] is idempotent, returns queued regions to the
//!   [`BufferPool`], and never runs the pending read's completion.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bytes::Bytes;
//! use mongo_transport::{Transport, TransportConfig};
//!
//! let transport = Transport::new(TransportConfig::new("localhost", 27017))?;
//! transport.open_async().await?;
//! transport.write_async(vec![Bytes::from_static(b"ping")]).await?;
//! let header = transport.read_async(16).await?;
//! transport.close();
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod error;
mod inbound;
pub mod pool;
pub mod transport;

pub use buffer::CompositeBuffer;
pub use config::{DEFAULT_MAX_BUFFERED, DEFAULT_PORT, DEFAULT_READ_CHUNK_SIZE, TransportConfig};
pub use error::{Result, TransportError};
pub use pool::BufferPool;
pub use transport::{ReadFuture, Transport, TransportState};
