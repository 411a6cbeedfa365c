//! Streaming client internals.
//!
//! Layered bottom-up: [`framing`] decodes byte chunks into lines,
//! [`dispatch`] parses lines and invokes the handler, [`backoff`] computes
//! reconnect delays, [`supervisor`] drives the connection lifecycle over a
//! [`transport`], and [`client`] is the public façade tying them together.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod supervisor;
pub mod transport;

mod backoff;

pub use client::{StreamClient, StreamHandle};
pub use dispatch::{HandlerError, MessageHandler};
pub use error::StreamError;
pub use framing::{LineDecoder, RawMessage};
pub use supervisor::{ConnectionState, StatusEvent};
pub use transport::{ChunkStream, HttpTransport, Transport, TransportError};
