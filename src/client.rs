//! Request execution with retries, deadlines and cancellation.
//!
//! The [`Client`] type is the entry point for making calls. Use
//! [`ClientBuilder`](crate::ClientBuilder) to configure and create clients.

use crate::{
    classify::{classify, Outcome},
    config::{apply_credentials, ClientBuilder, ClientConfig},
    decode::decode_body,
    error::TransportCause,
    request::RequestSpec,
    retry::{Attempt, RetryDecision},
    Response, Result,
};
use http::{header::ACCEPT, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A client for the agent service.
///
/// Cloning is cheap; clones share the same immutable configuration and the
/// underlying HTTP stack, so one client can serve any number of concurrent calls.
///
/// # Examples
///
/// ```no_run
/// use palaver::{Client, RequestSpec, ToolState};
/// use http::Method;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Session {
///     id: String,
///     title: String,
/// }
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .base_url("http://127.0.0.1:4096")?
///     .max_retries(3)
///     .build()?;
///
/// let session = client
///     .post::<_, Session>("/session", &serde_json::json!({"title": "triage"}))
///     .await?;
///
/// let spec = RequestSpec::builder(Method::GET, "/session/{id}/tool/{callID}")
///     .path_param("id", session.id.clone())
///     .path_param("callID", "call_1")
///     .build()?;
/// let state = client.execute::<ToolState>(spec).await?;
/// println!("{:?}", state.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) http_client: reqwest::Client,
    pub(crate) config: ClientConfig,
}

/// Caller-side limits for a single call.
///
/// The overall deadline covers every attempt and every backoff wait. It is checked
/// alongside the client's per-attempt timeout, so whichever is tighter wins.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl CallOptions {
    /// No deadline and no cancellation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts the call at `deadline`.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Aborts the call `timeout` from now.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// Aborts the call when `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The configuration every call reads.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Executes `spec` and decodes the body as `Res`.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`Error`](crate::Error) once retries are exhausted or the
    /// failure is not retryable.
    pub async fn execute<Res>(&self, spec: RequestSpec) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        self.execute_with(spec, CallOptions::default()).await
    }

    /// Executes `spec` under the caller's deadline and cancellation token.
    ///
    /// Each attempt is classified, then handed to the retry policy. Retryable failures
    /// wait out the backoff and try again; the wait itself is abandoned as soon as the
    /// deadline passes or the token fires.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`Error`](crate::Error); cancellation and deadline expiry
    /// surface as [`Error::Transport`](crate::Error::Transport).
    pub async fn execute_with<Res>(
        &self,
        spec: RequestSpec,
        options: CallOptions,
    ) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let start_time = Instant::now();
        let policy = self.inner.config.retry_policy();
        let url = self.url_for(&spec);
        let mut number = 0u32;
        let mut backoff = Duration::ZERO;

        loop {
            let outcome = self.send_once(&spec, &url, number, &options).await;

            let result = classify(outcome).and_then(|success| {
                let data = decode_body::<Res>(&success.body, success.status)?;
                Ok(Response::new(
                    data,
                    success.body,
                    success.status,
                    success.headers,
                    start_time.elapsed(),
                    number as usize + 1,
                ))
            });

            let attempt = Attempt {
                number,
                backoff,
                outcome: result,
            };

            match policy.decide(&attempt) {
                RetryDecision::None => {
                    if let Err(e) = &attempt.outcome {
                        tracing::warn!(
                            error = %e,
                            attempts = number + 1,
                            method = %spec.method(),
                            path = %spec.path(),
                            "Request failed"
                        );
                    }
                    return attempt.outcome;
                }
                RetryDecision::After(delay) => {
                    if let Err(e) = &attempt.outcome {
                        tracing::warn!(
                            error = %e,
                            attempt = number,
                            method = %spec.method(),
                            path = %spec.path(),
                            "Attempt failed"
                        );
                    }
                    tracing::info!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = number,
                        "Retrying request after delay"
                    );

                    wait_backoff(delay, &options).await?;
                    number += 1;
                    backoff = delay;
                }
            }
        }
    }

    /// Runs one attempt and reports what happened, without interpreting the status.
    async fn send_once(
        &self,
        spec: &RequestSpec,
        url: &Url,
        number: u32,
        options: &CallOptions,
    ) -> Outcome {
        let timeout = spec.timeout().unwrap_or(self.inner.config.request_timeout);
        let sent_at = Instant::now();

        tracing::debug!(
            method = %spec.method(),
            url = %url,
            attempt = number,
            "Executing HTTP request"
        );

        let request = self.build_request(spec, url.clone());
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let result = tokio::select! {
            biased;
            _ = cancelled(options.cancel.as_ref()) => {
                tracing::info!(attempt = number, "Call cancelled");
                return Outcome::TransportFailure(TransportCause::Cancelled);
            }
            _ = deadline_reached(options.deadline) => {
                tracing::info!(attempt = number, "Call deadline exceeded");
                return Outcome::TransportFailure(TransportCause::DeadlineExceeded);
            }
            result = tokio::time::timeout(timeout, exchange) => result,
        };

        match result {
            Err(_elapsed) => Outcome::TransportFailure(TransportCause::Timeout),
            Ok(Err(e)) if e.is_timeout() => Outcome::TransportFailure(TransportCause::Timeout),
            Ok(Err(e)) => Outcome::TransportFailure(TransportCause::Network(e)),
            Ok(Ok((status, headers, body))) => {
                tracing::info!(
                    status = status.as_u16(),
                    latency_ms = sent_at.elapsed().as_millis() as u64,
                    attempt = number,
                    "Received HTTP response"
                );
                Outcome::Received {
                    status,
                    headers,
                    body,
                }
            }
        }
    }

    fn build_request(&self, spec: &RequestSpec, url: Url) -> reqwest::RequestBuilder {
        let config = &self.inner.config;
        let mut request = self
            .inner
            .http_client
            .request(spec.method().clone(), url)
            .header(ACCEPT, "application/json");

        for (name, value) in &config.default_headers {
            request = request.header(name, value);
        }

        if let Some(credentials) = &config.credentials {
            request = apply_credentials(request, credentials);
        }

        for (name, value) in spec.headers() {
            request = request.header(name, value);
        }

        // sets Content-Type: application/json
        if let Some(body) = spec.body() {
            request = request.json(body);
        }

        request
    }

    /// Joins the spec's path onto the base URL's path and appends the query.
    fn url_for(&self, spec: &RequestSpec) -> Url {
        let mut url = self.inner.config.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(spec.segments());
        }
        if !spec.query().is_empty() {
            url.query_pairs_mut().extend_pairs(spec.query().to_pairs());
        }
        url
    }

    /// Makes a GET request to a path with no placeholders.
    pub async fn get<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let spec = RequestSpec::builder(Method::GET, path).build()?;
        self.execute(spec).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let spec = RequestSpec::builder(Method::POST, path).json(body).build()?;
        self.execute(spec).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<Req, Res>(&self, path: impl Into<String>, body: &Req) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let spec = RequestSpec::builder(Method::PUT, path).json(body).build()?;
        self.execute(spec).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<Req, Res>(
        &self,
        path: impl Into<String>,
        body: &Req,
    ) -> Result<Response<Res>>
    where
        Req: Serialize + ?Sized,
        Res: DeserializeOwned,
    {
        let spec = RequestSpec::builder(Method::PATCH, path).json(body).build()?;
        self.execute(spec).await
    }

    /// Makes a DELETE request.
    pub async fn delete<Res>(&self, path: impl Into<String>) -> Result<Response<Res>>
    where
        Res: DeserializeOwned,
    {
        let spec = RequestSpec::builder(Method::DELETE, path).build()?;
        self.execute(spec).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Sleeps for `delay` unless the call is cancelled or its deadline passes first.
async fn wait_backoff(delay: Duration, options: &CallOptions) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancelled(options.cancel.as_ref()) => {
            tracing::info!("Call cancelled during backoff");
            Err(TransportCause::Cancelled.into())
        }
        _ = deadline_reached(options.deadline) => {
            tracing::info!("Call deadline exceeded during backoff");
            Err(TransportCause::DeadlineExceeded.into())
        }
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> Client {
        Client::builder().base_url(base).unwrap().build().unwrap()
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let spec = RequestSpec::builder(Method::GET, "/session/{id}")
            .path_param("id", "ses_1")
            .build()
            .unwrap();

        let url = client("http://localhost:4096/api").url_for(&spec);
        assert_eq!(url.as_str(), "http://localhost:4096/api/session/ses_1");

        let url = client("http://localhost:4096/api/").url_for(&spec);
        assert_eq!(url.as_str(), "http://localhost:4096/api/session/ses_1");

        let url = client("http://localhost:4096").url_for(&spec);
        assert_eq!(url.as_str(), "http://localhost:4096/session/ses_1");
    }

    #[test]
    fn test_path_params_are_single_segments() {
        let spec = RequestSpec::builder(Method::GET, "/file/{name}")
            .path_param("name", "a/b c")
            .build()
            .unwrap();
        let url = client("http://localhost:4096").url_for(&spec);
        assert_eq!(url.path(), "/file/a%2Fb%20c");
    }

    #[tokio::test]
    async fn test_backoff_wait_completes() {
        wait_backoff(Duration::from_millis(5), &CallOptions::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_backoff_wait_honors_cancellation() {
        let token = CancellationToken::new();
        token.cancel();
        let options = CallOptions::new().cancel_token(token);

        let started = Instant::now();
        let err = wait_backoff(Duration::from_secs(30), &options)
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(
            err,
            crate::Error::Transport {
                cause: TransportCause::Cancelled
            }
        ));
    }

    #[tokio::test]
    async fn test_backoff_wait_honors_deadline() {
        let options = CallOptions::new().timeout(Duration::from_millis(20));
        let err = wait_backoff(Duration::from_secs(30), &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Transport {
                cause: TransportCause::DeadlineExceeded
            }
        ));
    }
}
