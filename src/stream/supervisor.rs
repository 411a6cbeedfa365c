//! Connection lifecycle supervision.
//!
//! Owns the request lifecycle for one stream: connect, read until the
//! connection dies or stalls, back off, reconnect. Every state transition is
//! observable through the status callback.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::StreamConfig;

use super::backoff::Backoff;
use super::dispatch::{Dispatcher, ErrorSink};
use super::error::StreamError;
use super::framing::LineDecoder;
use super::transport::{ChunkStream, Transport, TransportError};

/// Lifecycle state of one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not yet started.
    Idle,
    /// Connection attempt in flight.
    Connecting,
    /// Response accepted, body being read.
    Streaming,
    /// Waiting out a reconnect delay.
    Backoff,
    /// Terminal: stopped or fatally failed.
    Closed,
}

/// One observed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    /// The state entered.
    pub state: ConnectionState,
    /// Consecutive failed connect attempts at the time of the transition.
    pub attempt: u32,
    /// For [`ConnectionState::Backoff`], the delay before the next attempt.
    pub delay: Option<Duration>,
}

/// Callback invoked on every state transition.
pub type StatusCallback = Arc<dyn Fn(StatusEvent) + Send + Sync>;

/// Logs transitions and forwards them to the caller's status callback.
#[derive(Clone, Default)]
pub(crate) struct StatusSink {
    callback: Option<StatusCallback>,
}

impl StatusSink {
    pub(crate) fn new(callback: Option<StatusCallback>) -> Self {
        Self { callback }
    }

    fn transition(&self, state: ConnectionState, attempt: u32, delay: Option<Duration>) {
        tracing::debug!(?state, attempt, ?delay, "connection state transition");
        if let Some(cb) = &self.callback {
            cb(StatusEvent {
                state,
                attempt,
                delay,
            });
        }
    }
}

/// Why a streaming connection ended.
enum Disconnect {
    /// Cancellation observed; terminal.
    Stopped,
    /// The connection failed; report and reconnect.
    Failed(StreamError),
}

/// Drives connect / stream / backoff for one handle until stopped or
/// fatally rejected.
pub(crate) struct Supervisor {
    config: StreamConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    errors: ErrorSink,
    status: StatusSink,
    cancel: CancellationToken,
}

impl Supervisor {
    pub(crate) fn new(
        config: StreamConfig,
        transport: Arc<dyn Transport>,
        dispatcher: Dispatcher,
        errors: ErrorSink,
        status: StatusSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            transport,
            dispatcher,
            errors,
            status,
            cancel,
        }
    }

    /// Run until cancelled or fatally rejected.
    pub(crate) async fn run(self) {
        let mut backoff = Backoff::new(self.config.backoff.clone());
        self.status.transition(ConnectionState::Idle, 0, None);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.status
                .transition(ConnectionState::Connecting, backoff.attempt(), None);

            let connected = tokio::select! {
                () = self.cancel.cancelled() => break,
                result = self.transport.connect(&self.config) => result,
            };

            let (attempt, delay) = match connected {
                Ok(chunks) => {
                    self.status
                        .transition(ConnectionState::Streaming, backoff.attempt(), None);
                    let started = Instant::now();

                    match self.stream_body(chunks).await {
                        Disconnect::Stopped => break,
                        Disconnect::Failed(err) => self.errors.report(err),
                    }

                    if backoff.is_stable_period(started.elapsed()) {
                        backoff.reset();
                    }
                    (backoff.attempt(), backoff.next_delay())
                }
                Err(TransportError::Rejected { status, detail }) => {
                    self.errors.report(StreamError::Rejected { status, detail });
                    break;
                }
                Err(TransportError::RateLimited { status }) => {
                    self.errors.report(StreamError::RateLimited { status });
                    (backoff.attempt(), backoff.next_rate_limited_delay())
                }
                Err(err) => {
                    self.errors.report(StreamError::Connect(err.to_string()));
                    (backoff.attempt(), backoff.next_delay())
                }
            };

            self.status
                .transition(ConnectionState::Backoff, attempt, Some(delay));
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        self.status.transition(ConnectionState::Closed, 0, None);
    }

    /// Consume one connection's body until it dies, stalls, or is cancelled.
    async fn stream_body(&self, mut chunks: ChunkStream) -> Disconnect {
        // Fresh decoder per connection: a partial line from a dead
        // connection must not leak into the next one.
        let mut decoder = LineDecoder::new(self.config.max_frame_bytes);

        loop {
            let next = tokio::select! {
                () = self.cancel.cancelled() => return Disconnect::Stopped,
                next = tokio::time::timeout(self.config.idle_timeout, chunks.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    return Disconnect::Failed(StreamError::Read(format!(
                        "no bytes for {:?}, connection stalled",
                        self.config.idle_timeout
                    )));
                }
                Ok(None) => {
                    return Disconnect::Failed(StreamError::Read(
                        "server closed the connection".to_string(),
                    ));
                }
                Ok(Some(Err(err))) => {
                    return Disconnect::Failed(StreamError::Read(err.to_string()));
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            match decoder.push(&chunk) {
                Ok(lines) => {
                    for line in &lines {
                        self.dispatcher.dispatch(line);
                    }
                }
                Err(err) => return Disconnect::Failed(err),
            }
        }
    }
}
