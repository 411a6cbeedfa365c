//! Stream error types.

/// Errors reported asynchronously through the error callback.
///
/// None of these terminate the stream except [`StreamError::Rejected`]:
/// connect and read failures trigger backoff and reconnect, frame and parse
/// failures skip the offending record, and handler failures are isolated to
/// the message that caused them.
#[derive(thiserror::Error, Debug)]
pub enum StreamError {
    /// Transport-level failure to establish the connection.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The server signalled rate limiting (HTTP 420/429) on connect.
    #[error("rate limited by server (HTTP {status})")]
    RateLimited {
        /// The HTTP status code returned.
        status: u16,
    },

    /// The server rejected the request with a non-retryable status.
    ///
    /// Reported once, then the stream closes.
    #[error("connection rejected (HTTP {status}): {detail}")]
    Rejected {
        /// The HTTP status code returned.
        status: u16,
        /// Response body, when the server sent one.
        detail: String,
    },

    /// Failure while streaming: reset, idle timeout, or server close.
    #[error("read failed: {0}")]
    Read(String),

    /// A single line exceeded the configured maximum frame size.
    #[error("frame exceeds {limit} byte limit")]
    MalformedFrame {
        /// The configured limit that was exceeded.
        limit: usize,
    },

    /// A record was not valid JSON. The record is skipped.
    #[error("invalid JSON record: {0}")]
    Parse(#[from] serde_json::Error),

    /// The caller-supplied handler returned an error or panicked.
    #[error("message handler failed: {0}")]
    Handler(String),
}

impl StreamError {
    /// Whether this error terminates the stream instead of triggering
    /// backoff or a record skip.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_frame_display() {
        let err = StreamError::MalformedFrame { limit: 1024 };
        assert_eq!(err.to_string(), "frame exceeds 1024 byte limit");
    }

    #[test]
    fn test_rejected_is_fatal() {
        let err = StreamError::Rejected {
            status: 401,
            detail: "unauthorized".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_recoverable_errors_not_fatal() {
        assert!(!StreamError::Connect("refused".to_string()).is_fatal());
        assert!(!StreamError::RateLimited { status: 420 }.is_fatal());
        assert!(!StreamError::Read("reset".to_string()).is_fatal());
        assert!(!StreamError::MalformedFrame { limit: 1 }.is_fatal());
        assert!(!StreamError::Handler("boom".to_string()).is_fatal());
    }

    #[test]
    fn test_from_serde_error() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: StreamError = parse_err.into();
        assert!(matches!(err, StreamError::Parse(_)));
        assert!(err.to_string().contains("invalid JSON record"));
    }
}
