//! Error types surfaced by every call.
//!
//! A call can fail in exactly four ways: the caller's parameters were rejected locally
//! ([`Error::ParamValidation`]), no response was obtained ([`Error::Transport`]), the
//! server answered with a non-success status ([`Error::Api`]), or a successful body could
//! not be read as the requested shape ([`Error::Decode`]). Each variant keeps enough
//! context to log or branch on the failure without re-issuing the call.

use http::{HeaderMap, StatusCode};

/// The error type returned by every call made through [`Client`](crate::Client).
///
/// # Examples
///
/// ```no_run
/// use palaver::{Client, Error};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder().base_url("http://127.0.0.1:4096")?.build()?;
///
/// match client.get::<serde_json::Value>("/session").await {
///     Ok(response) => println!("sessions: {}", response.data),
///     Err(Error::Api { status, raw_response, .. }) if status.is_client_error() => {
///         eprintln!("rejected ({}): {}", status, raw_response);
///     }
///     Err(Error::Decode { raw_response, serde_error, .. }) => {
///         eprintln!("unexpected body {}: {}", raw_response, serde_error);
///     }
///     Err(e) => eprintln!("call failed: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Caller-supplied data violated a required or shape contract.
    ///
    /// Always raised locally; the request is never sent.
    #[error("Invalid parameter `{field}`: {reason}")]
    ParamValidation {
        /// The offending parameter, as it would appear on the wire.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// No response was obtained from the server.
    #[error("Transport error: {cause}")]
    Transport {
        /// What prevented the exchange from completing.
        #[source]
        cause: TransportCause,
    },

    /// The server responded with a status outside 200-299.
    ///
    /// The body is kept undecoded so callers can branch on the status first.
    #[error("API error {status}: {raw_response}")]
    Api {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// A 2xx body could not be decoded into the requested shape.
    #[error("Failed to decode response (status {status}): {serde_error}")]
    Decode {
        /// The raw response body that failed to decode
        raw_response: String,
        /// The serde error message, naming the offending field when there is one
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },
}

/// Why an exchange produced no response.
#[derive(thiserror::Error, Debug)]
pub enum TransportCause {
    /// The per-attempt request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The caller's overall deadline elapsed, either mid-request or mid-backoff.
    #[error("call deadline exceeded")]
    DeadlineExceeded,

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// Connection, DNS, TLS or body-read failure reported by the HTTP stack.
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

impl TransportCause {
    /// Returns `true` if the call was aborted by the caller rather than by the network.
    pub fn is_caller_abort(&self) -> bool {
        matches!(self, TransportCause::Cancelled | TransportCause::DeadlineExceeded)
    }
}

impl From<TransportCause> for Error {
    fn from(cause: TransportCause) -> Self {
        Error::Transport { cause }
    }
}

impl Error {
    /// Builds a [`Error::ParamValidation`] for `field`.
    pub fn param(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ParamValidation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error is eligible for another attempt.
    ///
    /// Transport failures and 5xx responses are retryable. Caller aborts, every other
    /// status (429 included) and all local or decode errors are terminal.
    ///
    /// # Examples
    ///
    /// ```
    /// use palaver::Error;
    /// use http::{HeaderMap, StatusCode};
    ///
    /// let err = Error::Api {
    ///     status: StatusCode::BAD_GATEWAY,
    ///     raw_response: "upstream down".to_string(),
    ///     headers: HeaderMap::new(),
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::Api {
    ///     status: StatusCode::TOO_MANY_REQUESTS,
    ///     raw_response: "slow down".to_string(),
    ///     headers: HeaderMap::new(),
    /// };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { cause } => !cause.is_caller_abort(),
            Error::Api { status, .. } => status.is_server_error(),
            Error::ParamValidation { .. } => false,
            Error::Decode { .. } => false,
        }
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Decode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if a response was received.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Api { raw_response, .. } => Some(raw_response),
            Error::Decode { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns the rejected parameter name for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::ParamValidation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// A specialized `Result` type for calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> Error {
        Error::Api {
            status: StatusCode::from_u16(status).unwrap(),
            raw_response: String::new(),
            headers: HeaderMap::new(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(api(500).is_retryable());
        assert!(api(503).is_retryable());
        assert!(api(599).is_retryable());
        assert!(!api(400).is_retryable());
        assert!(!api(429).is_retryable());
        assert!(!api(302).is_retryable());
    }

    #[test]
    fn test_transport_retryability() {
        assert!(Error::from(TransportCause::Timeout).is_retryable());
        assert!(!Error::from(TransportCause::Cancelled).is_retryable());
        assert!(!Error::from(TransportCause::DeadlineExceeded).is_retryable());
    }

    #[test]
    fn test_local_errors_are_terminal() {
        let err = Error::param("sessionID", "must not be empty");
        assert!(!err.is_retryable());
        assert_eq!(err.field(), Some("sessionID"));
        assert_eq!(err.status(), None);

        let err = Error::Decode {
            raw_response: "{}".to_string(),
            serde_error: "missing field `id`".to_string(),
            status: StatusCode::OK,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.raw_response(), Some("{}"));
    }
}
