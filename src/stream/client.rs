//! Public client façade and stream handle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, StreamConfig};

use super::dispatch::{Dispatcher, ErrorCallback, ErrorSink, MessageHandler};
use super::error::StreamError;
use super::supervisor::{StatusCallback, StatusEvent, StatusSink, Supervisor};
use super::transport::{HttpTransport, Transport};

/// How long [`StreamHandle::stop`] waits for the supervisor to wind down
/// before aborting its task.
const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Entry point for starting streams.
///
/// One client can start any number of independent streams; each
/// [`start`](Self::start) call spawns its own supervisor task and returns a
/// handle owning it. Error and status callbacks registered here are shared by
/// every stream the client starts.
///
/// ```no_run
/// use firehose_client::{AuthMaterial, HandlerError, StreamClient, StreamConfig};
///
/// # async fn example() -> Result<(), firehose_client::ConfigError> {
/// let client = StreamClient::new()
///     .on_error(|e| eprintln!("stream error: {e}"))
///     .on_status(|s| eprintln!("state: {:?}", s.state));
///
/// let config = StreamConfig::new("https://stream.example.com/feed")
///     .with_auth(AuthMaterial::Bearer("token".into()));
///
/// let handle = client.start(config, |message: serde_json::Value| -> Result<(), HandlerError> {
///     println!("{message}");
///     Ok(())
/// })?;
///
/// // ... later:
/// handle.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct StreamClient {
    transport: Arc<dyn Transport>,
    on_error: Option<ErrorCallback>,
    on_status: Option<StatusCallback>,
}

impl StreamClient {
    /// Create a client using the production HTTP transport.
    #[must_use]
    pub fn new() -> Self {
        Self::with_transport(Arc::new(HttpTransport::new()))
    }

    /// Create a client with a custom transport. Used by tests and by callers
    /// who need to tunnel the request through something other than plain
    /// `reqwest`.
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            on_error: None,
            on_status: None,
        }
    }

    /// Register a callback invoked once per reported [`StreamError`].
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(StreamError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    /// Register a callback invoked on every connection state transition.
    #[must_use]
    pub fn on_status(mut self, callback: impl Fn(StatusEvent) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration and begin streaming in a background task.
    ///
    /// Returns immediately with a handle for cancellation. Must be called
    /// from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid; no
    /// connection is attempted in that case. All later failures are reported
    /// through the error callback instead.
    pub fn start(
        &self,
        config: StreamConfig,
        handler: impl MessageHandler + 'static,
    ) -> Result<StreamHandle, ConfigError> {
        config.validate()?;

        let cancel = CancellationToken::new();
        let errors = ErrorSink::new(self.on_error.clone());
        let status = StatusSink::new(self.on_status.clone());
        let dispatcher = Dispatcher::new(Arc::new(handler), errors.clone());
        let supervisor = Supervisor::new(
            config,
            Arc::clone(&self.transport),
            dispatcher,
            errors,
            status,
            cancel.clone(),
        );

        let task = tokio::spawn(supervisor.run());
        Ok(StreamHandle {
            cancel,
            task,
            stop_grace: DEFAULT_STOP_GRACE,
        })
    }
}

impl Default for StreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of one running stream.
///
/// Dropping the handle without calling [`stop`](Self::stop) leaves the
/// stream running detached.
pub struct StreamHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    stop_grace: Duration,
}

impl StreamHandle {
    /// Token cancelled when the stream stops; clone it to tie other work to
    /// this stream's lifetime.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the stream has terminated (stopped or fatally rejected).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Override the grace period [`stop`](Self::stop) allows before
    /// aborting the task.
    #[must_use]
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Request shutdown and wait for it to complete.
    ///
    /// Cancellation is cooperative: the supervisor observes it at its next
    /// suspension point (chunk wait, connect, or backoff sleep). If it has
    /// not wound down within the grace period the task is aborted. Once this
    /// returns, no further callback of any kind fires for this stream.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        let outcome = tokio::time::timeout(self.stop_grace, &mut self.task).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "stream task failed during shutdown"),
            Err(_) => {
                tracing::warn!("stream did not stop within grace period, aborting");
                self.task.abort();
                let _ = self.task.await;
            }
        }
    }

    /// Wait for the stream to terminate on its own (fatal rejection).
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if !e.is_cancelled() {
                tracing::error!(error = %e, "stream task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMaterial;
    use crate::stream::transport::{ChunkStream, TransportError};
    use async_trait::async_trait;

    /// Transport whose connect never resolves; stop must still work.
    struct NeverConnects;

    #[async_trait]
    impl Transport for NeverConnects {
        async fn connect(&self, _config: &StreamConfig) -> Result<ChunkStream, TransportError> {
            std::future::pending().await
        }
    }

    fn noop_handler() -> impl MessageHandler {
        use crate::stream::dispatch::HandlerError;
        |_message: serde_json::Value| -> Result<(), HandlerError> { Ok(()) }
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config_synchronously() {
        let client = StreamClient::with_transport(Arc::new(NeverConnects));
        let result = client.start(StreamConfig::new(""), noop_handler());
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint(..))));
    }

    #[tokio::test]
    async fn test_stop_while_connect_is_pending() {
        let client = StreamClient::with_transport(Arc::new(NeverConnects));
        let config = StreamConfig::new("https://stream.example.com/feed")
            .with_auth(AuthMaterial::Bearer("token".to_string()));
        let handle = client.start(config, noop_handler()).unwrap();

        assert!(!handle.is_finished());
        tokio::time::timeout(Duration::from_secs(2), handle.stop())
            .await
            .expect("stop did not complete");
    }

    #[tokio::test]
    async fn test_cancellation_token_follows_stop() {
        let client = StreamClient::with_transport(Arc::new(NeverConnects));
        let config = StreamConfig::new("https://stream.example.com/feed");
        let handle = client.start(config, noop_handler()).unwrap();

        let token = handle.cancellation_token();
        assert!(!token.is_cancelled());
        handle.stop().await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_default_client_builds() {
        let client = StreamClient::default();
        assert!(client.on_error.is_none());
        assert!(client.on_status.is_none());
    }
}
