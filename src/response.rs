//! Successful call results.
//!
//! [`Response`] wraps the decoded body together with what was observed on the wire:
//! status, headers, the raw body, total latency and how many attempts the call took.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A decoded 2xx response.
///
/// # Examples
///
/// ```no_run
/// use palaver::{Client, ToolState};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder().build()?;
///
/// let state = client.get::<ToolState>("/session/ses_1/tool/call_7").await?;
/// if let Some(done) = state.as_completed() {
///     println!("{} -> {}", done.title, done.output);
/// }
/// println!("took {:?} over {} attempt(s)", state.latency, state.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data.
    pub data: T,

    /// The raw response body, exactly as received.
    pub raw_body: String,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt being issued to the final body being read,
    /// including backoff waits.
    pub latency: Duration,

    /// Number of attempts made; `1` if the first attempt succeeded.
    pub attempts: usize,
}

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        raw_body: String,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use palaver::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     vec!["ses_1".to_string(), "ses_2".to_string()],
    ///     r#"["ses_1","ses_2"]"#.to_string(),
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(12),
    ///     1,
    /// );
    ///
    /// let count = response.map(|ids| ids.len());
    /// assert_eq!(count.data, 2);
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the call needed more than one attempt.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// # use palaver::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new((), String::new(), StatusCode::OK, headers, Duration::ZERO, 1);
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// assert_eq!(response.header("x-missing"), None);
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Discards the metadata, returning only the data.
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> std::ops::Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}
