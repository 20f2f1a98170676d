//! # mongo-testing
//!
//! Test infrastructure for the document-store transport.
//!
//! [`ScriptedServer`] listens on a loopback port and replays a fixed list of
//! steps on every accepted connection. Irregular inbound chunking is produced
//! by separating `Send` steps with pauses, and `Expect` steps record what the
//! client wrote.
//!
//! ```rust,ignore
//! use mongo_testing::{ScriptedServer, Step};
//!
//! let server = ScriptedServer::start(vec![
//!     Step::send(b"abc"),
//!     Step::pause_ms(20),
//!     Step::send(b"d"),
//!     Step::Expect(4),
//! ])
//! .await?;
//! // connect a transport to server.host():server.port() ...
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod scripted_server;

pub use scripted_server::{Result, ScriptedServer, ScriptedServerError, Step};
