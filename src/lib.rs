//! Resilient client for newline-delimited JSON HTTP streaming endpoints.
//!
//! Opens a long-lived chunked HTTP connection, reads JSON records as they
//! arrive, and dispatches each one to a caller-supplied handler. Connections
//! that fail, stall, or get closed by the server are reopened with
//! exponential backoff; a single bad record or a failing handler never takes
//! the stream down.

pub mod config;
pub mod stream;

pub use config::{AuthMaterial, BackoffConfig, ConfigError, StreamConfig};
pub use stream::{
    ConnectionState, HandlerError, MessageHandler, StatusEvent, StreamClient, StreamError,
    StreamHandle,
};
