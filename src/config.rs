//! Stream configuration types and validation.

use std::time::Duration;

use url::Url;

/// Default idle timeout before a silent connection is considered stalled.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Default maximum size of a single line before the frame is rejected.
const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Errors from configuration validation.
///
/// These are the only errors surfaced synchronously from
/// [`StreamClient::start`](crate::stream::StreamClient::start); everything
/// else is reported through the error callback.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Endpoint is empty or not a valid HTTP(S) URL.
    #[error("invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),

    /// A duration parameter is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// Maximum frame size is zero.
    #[error("max_frame_bytes must be greater than zero")]
    ZeroFrameSize,

    /// Backoff multiplier is below 1.0 or not finite.
    #[error("backoff multiplier must be finite and >= 1.0, got {0}")]
    InvalidMultiplier(f64),

    /// Max backoff delay is below the initial delay.
    #[error("max backoff delay must be >= initial delay")]
    BackoffRange,

    /// Auth material contains an empty token or header name.
    #[error("invalid auth material: {0}")]
    InvalidAuth(&'static str),
}

/// Opaque authentication material attached to the streaming request.
///
/// The client never interprets this beyond turning it into request headers.
/// Signature computation (OAuth and friends) is the caller's job; pass the
/// finished header values here.
#[derive(Debug, Clone, Default)]
pub enum AuthMaterial {
    /// No authentication.
    #[default]
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// Arbitrary header name/value pairs, attached verbatim.
    Headers(Vec<(String, String)>),
}

impl AuthMaterial {
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::None => Ok(()),
            Self::Bearer(token) => {
                if token.trim().is_empty() {
                    return Err(ConfigError::InvalidAuth("empty bearer token"));
                }
                Ok(())
            }
            Self::Headers(headers) => {
                if headers.iter().any(|(name, _)| name.trim().is_empty()) {
                    return Err(ConfigError::InvalidAuth("empty header name"));
                }
                Ok(())
            }
        }
    }
}

/// Reconnect backoff parameters.
///
/// Delays follow `min(max_delay, initial_delay * multiplier^attempt)`. The
/// attempt counter resets to zero once a connection has streamed continuously
/// for at least `stability_window`.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
    /// Growth factor applied per consecutive failed attempt.
    pub multiplier: f64,
    /// Continuous streaming time after which the attempt counter resets.
    pub stability_window: Duration,
    /// Base delay used instead of `initial_delay` when the server signals
    /// rate limiting (HTTP 420/429) on connect.
    pub rate_limit_floor: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(320),
            multiplier: 2.0,
            stability_window: Duration::from_secs(60),
            rate_limit_floor: Duration::from_secs(60),
        }
    }
}

impl BackoffConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_delay.is_zero() {
            return Err(ConfigError::ZeroDuration("backoff initial_delay"));
        }
        if self.rate_limit_floor.is_zero() {
            return Err(ConfigError::ZeroDuration("backoff rate_limit_floor"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::BackoffRange);
        }
        Ok(())
    }
}

/// Immutable configuration for one stream.
///
/// Built once with [`StreamConfig::new`] and the `with_*` methods, validated
/// by the client on `start`, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Full URL of the streaming endpoint, including any query string.
    pub endpoint: String,
    /// Authentication material attached to every connection attempt.
    pub auth: AuthMaterial,
    /// No bytes for this long while streaming means the connection is
    /// treated as dead and torn down for reconnect.
    pub idle_timeout: Duration,
    /// Maximum size of a single line; larger frames abort the connection.
    pub max_frame_bytes: usize,
    /// Reconnect backoff parameters.
    pub backoff: BackoffConfig,
}

impl StreamConfig {
    /// Create a configuration for the given endpoint URL with defaults:
    /// no auth, 90 s idle timeout, 1 MiB frame limit, default backoff.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth: AuthMaterial::None,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            backoff: BackoffConfig::default(),
        }
    }

    /// Set the authentication material.
    #[must_use]
    pub fn with_auth(mut self, auth: AuthMaterial) -> Self {
        self.auth = auth;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum frame size in bytes.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, bytes: usize) -> Self {
        self.max_frame_bytes = bytes;
        self
    }

    /// Set the backoff parameters.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the endpoint is not a valid HTTP(S) URL,
    /// any duration or size is zero, the backoff parameters are inconsistent,
    /// or the auth material is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let trimmed = self.endpoint.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidEndpoint(
                self.endpoint.clone(),
                "empty endpoint".to_string(),
            ));
        }
        let url = Url::parse(trimmed).map_err(|e| {
            ConfigError::InvalidEndpoint(self.endpoint.clone(), e.to_string())
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidEndpoint(
                self.endpoint.clone(),
                format!("unsupported scheme {:?}", url.scheme()),
            ));
        }
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("idle_timeout"));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        self.backoff.validate()?;
        self.auth.validate()
    }
}
