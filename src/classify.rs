//! Classification of raw exchange outcomes into success or a typed error.

use crate::error::TransportCause;
use crate::Error;
use http::{HeaderMap, StatusCode};

/// What a single attempt produced, before any decoding.
#[derive(Debug)]
pub enum Outcome {
    /// A response with a status line and a fully read body.
    Received {
        /// The HTTP status code
        status: StatusCode,
        /// The response headers
        headers: HeaderMap,
        /// The raw response body
        body: String,
    },
    /// No usable response was obtained.
    TransportFailure(TransportCause),
}

/// A 2xx response whose body is ready for decoding.
#[derive(Debug)]
pub struct Success {
    /// The HTTP status code
    pub status: StatusCode,
    /// The response headers
    pub headers: HeaderMap,
    /// The raw response body, unchanged
    pub body: String,
}

/// Maps an [`Outcome`] to a [`Success`] or the matching [`Error`].
///
/// Only 200-299 is a success. Every other status, redirects included, becomes
/// [`Error::Api`] with the body left undecoded.
///
/// # Examples
///
/// ```
/// use palaver::classify::{classify, Outcome};
/// use http::{HeaderMap, StatusCode};
///
/// let outcome = Outcome::Received {
///     status: StatusCode::SERVICE_UNAVAILABLE,
///     headers: HeaderMap::new(),
///     body: "try later".to_string(),
/// };
/// let err = classify(outcome).unwrap_err();
/// assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
/// assert!(err.is_retryable());
/// ```
pub fn classify(outcome: Outcome) -> Result<Success, Error> {
    match outcome {
        Outcome::Received {
            status,
            headers,
            body,
        } => {
            if status.is_success() {
                return Ok(Success {
                    status,
                    headers,
                    body,
                });
            }

            if status.is_client_error() {
                tracing::error!(
                    status = status.as_u16(),
                    response = %body,
                    "Client error (4xx)"
                );
            } else if status.is_server_error() {
                tracing::warn!(
                    status = status.as_u16(),
                    response = %body,
                    "Server error (5xx)"
                );
            } else {
                tracing::warn!(status = status.as_u16(), "Unexpected non-success status");
            }

            Err(Error::Api {
                status,
                raw_response: body,
                headers,
            })
        }
        Outcome::TransportFailure(cause) => Err(Error::Transport { cause }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(status: u16, body: &str) -> Outcome {
        Outcome::Received {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_2xx_passes_body_through() {
        for status in [200, 201, 204, 299] {
            let success = classify(received(status, "{\"ok\":true}")).unwrap();
            assert_eq!(success.status.as_u16(), status);
            assert_eq!(success.body, "{\"ok\":true}");
        }
    }

    #[test]
    fn test_redirect_is_api_error() {
        let err = classify(received(302, "")).unwrap_err();
        assert!(matches!(err, Error::Api { status, .. } if status.as_u16() == 302));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_client_and_server_errors_keep_raw_body() {
        let err = classify(received(404, "not found")).unwrap_err();
        assert_eq!(err.raw_response(), Some("not found"));
        assert!(!err.is_retryable());

        let err = classify(received(500, "{\"name\":\"UnknownError\"}")).unwrap_err();
        assert_eq!(err.raw_response(), Some("{\"name\":\"UnknownError\"}"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_transport_failure() {
        let err = classify(Outcome::TransportFailure(TransportCause::Timeout)).unwrap_err();
        assert!(matches!(
            err,
            Error::Transport {
                cause: TransportCause::Timeout
            }
        ));
    }
}
