//! HTTP transport seam.
//!
//! The supervisor only needs "issue the request, hand me the body as byte
//! chunks"; everything HTTP lives behind the [`Transport`] trait so tests can
//! script connections without a network.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use reqwest::Client;

use crate::config::{AuthMaterial, StreamConfig};

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Statuses that indicate the request itself is wrong and will never
/// succeed on retry.
const FATAL_STATUSES: [u16; 5] = [401, 403, 404, 406, 413];

/// Statuses that signal server-side throttling of connect attempts.
const RATE_LIMIT_STATUSES: [u16; 2] = [420, 429];

/// Errors produced while establishing or reading a connection.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// DNS, TCP, or TLS level failure to reach the server.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The server is throttling connect attempts.
    #[error("rate limited (HTTP {status})")]
    RateLimited {
        /// The HTTP status code returned.
        status: u16,
    },

    /// Non-retryable rejection of the request.
    #[error("rejected (HTTP {status}): {detail}")]
    Rejected {
        /// The HTTP status code returned.
        status: u16,
        /// Response body, when available.
        detail: String,
    },

    /// Any other non-success status; retryable.
    #[error("unexpected status HTTP {status}")]
    Status {
        /// The HTTP status code returned.
        status: u16,
    },

    /// Failure while reading the response body.
    #[error("read failed: {0}")]
    Read(String),
}

/// Response body delivered incrementally as byte chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransportError>> + Send>>;

/// Opens one streaming connection per call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request and return the body as a chunk stream once the
    /// server has accepted it.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] classifying the failure: `Connect` and
    /// `Status` trigger ordinary backoff, `RateLimited` the rate-limit
    /// ladder, and `Rejected` closes the stream.
    async fn connect(&self, config: &StreamConfig) -> Result<ChunkStream, TransportError>;
}

/// Production transport backed by `reqwest`.
///
/// Only a connect timeout is set on the client; an overall request timeout
/// would kill the long-lived streaming body. Stall detection is the
/// supervisor's idle timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with its own connection pool.
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("firehose-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, config: &StreamConfig) -> Result<ChunkStream, TransportError> {
        let mut request = self.client.get(&config.endpoint);
        request = match &config.auth {
            AuthMaterial::None => request,
            AuthMaterial::Bearer(token) => request.bearer_auth(token),
            AuthMaterial::Headers(headers) => {
                let mut request = request;
                for (name, value) in headers {
                    request = request.header(name.as_str(), value.as_str());
                }
                request
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status().as_u16();
        if response.status().is_success() {
            tracing::debug!(status, endpoint = %config.endpoint, "stream connection established");
            let chunks = response
                .bytes_stream()
                .map(|r| r.map(|b| b.to_vec()).map_err(|e| TransportError::Read(e.to_string())));
            return Ok(Box::pin(chunks));
        }

        if RATE_LIMIT_STATUSES.contains(&status) {
            return Err(TransportError::RateLimited { status });
        }
        if FATAL_STATUSES.contains(&status) {
            let detail = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected { status, detail });
        }
        Err(TransportError::Status { status })
    }
}
