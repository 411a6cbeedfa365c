//! Per-record JSON parsing and handler dispatch.
//!
//! Handler failures are isolated to the record that caused them: a returned
//! error or a panic is reported through the error channel and the stream
//! moves on to the next record.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::error::StreamError;
use super::framing::RawMessage;

/// Boxed error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Receives each parsed message from the stream, in arrival order.
///
/// Invoked synchronously within the read loop: a slow handler delays
/// subsequent messages on the same stream. Hand long-running work off to a
/// worker instead of doing it inline.
pub trait MessageHandler: Send + Sync {
    /// Handle one parsed message. Ownership of the value transfers here.
    ///
    /// # Errors
    ///
    /// A returned error is reported through the stream's error callback and
    /// does not affect delivery of later messages.
    fn on_message(&self, message: serde_json::Value) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: Fn(serde_json::Value) -> Result<(), HandlerError> + Send + Sync,
{
    fn on_message(&self, message: serde_json::Value) -> Result<(), HandlerError> {
        self(message)
    }
}

/// Callback invoked once per reported [`StreamError`].
pub type ErrorCallback = Arc<dyn Fn(StreamError) + Send + Sync>;

/// Fan-out point for asynchronous errors.
///
/// Always logs; additionally forwards to the caller's error callback when
/// one is registered.
#[derive(Clone, Default)]
pub(crate) struct ErrorSink {
    callback: Option<ErrorCallback>,
}

impl ErrorSink {
    pub(crate) fn new(callback: Option<ErrorCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn report(&self, error: StreamError) {
        tracing::warn!(error = %error, "stream error");
        if let Some(cb) = &self.callback {
            cb(error);
        }
    }
}

/// Parses raw records and dispatches them to the registered handler.
pub(crate) struct Dispatcher {
    handler: Arc<dyn MessageHandler>,
    errors: ErrorSink,
}

impl Dispatcher {
    pub(crate) fn new(handler: Arc<dyn MessageHandler>, errors: ErrorSink) -> Self {
        Self { handler, errors }
    }

    /// Process one decoded line.
    ///
    /// Zero-length and whitespace-only records are keep-alive heartbeats and
    /// never reach the JSON parser. Parse failures and handler failures are
    /// reported and skipped; neither terminates the stream.
    pub(crate) fn dispatch(&self, raw: &RawMessage) {
        if raw.iter().all(u8::is_ascii_whitespace) {
            tracing::trace!("heartbeat line, skipping");
            return;
        }

        let value: serde_json::Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(e) => {
                self.errors.report(StreamError::Parse(e));
                return;
            }
        };

        let handler = Arc::clone(&self.handler);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || handler.on_message(value)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.errors.report(StreamError::Handler(e.to_string()));
            }
            Err(payload) => {
                self.errors
                    .report(StreamError::Handler(panic_message(payload.as_ref())));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
