//! Client configuration.
//!
//! [`ClientConfig`] is built once by [`ClientBuilder`] and then shared read-only by every
//! call the client makes. Nothing mutates it after construction.

use crate::client::{Client, ClientInner};
use crate::retry::RetryPolicy;
use http::header::{AUTHORIZATION, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:4096";

/// Per-attempt timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Problems detected while building a client.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The base URL could not be parsed.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The base URL cannot carry path segments (e.g. `mailto:`).
    #[error("Base URL cannot be a base: {0}")]
    NotABase(String),

    /// A header name or value was rejected.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// An environment variable was empty or unparsable.
    #[error("Invalid environment variable {name}: {reason}")]
    Env {
        /// The variable name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// The underlying HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Credential material attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Basic <base64(user:password)>`.
    Basic {
        /// The user name
        username: String,
        /// The password, if any
        password: Option<String>,
    },
    /// An arbitrary header carrying an API key.
    Header {
        /// The header name
        name: String,
        /// The header value
        value: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Header { name, .. } => f
                .debug_struct("Header")
                .field("name", name)
                .field("value", &"<redacted>")
                .finish(),
        }
    }
}

/// Immutable settings shared by every call.
#[derive(Clone)]
pub struct ClientConfig {
    /// Root URL; request paths are appended to its path.
    pub base_url: Url,
    /// Headers sent with every request.
    pub default_headers: HeaderMap,
    /// Credentials sent with every request.
    pub credentials: Option<Credentials>,
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single retry delay.
    pub max_delay: Duration,
    /// Whether retry delays are jittered.
    pub jitter: bool,
    /// Per-attempt deadline.
    pub request_timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("default_headers", &self.default_headers.keys().collect::<Vec<_>>())
            .field("credentials", &self.credentials)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(self)
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use palaver::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), palaver::ConfigError> {
/// let client = ClientBuilder::new()
///     .base_url("http://127.0.0.1:4096")?
///     .bearer_token("secret")
///     .max_retries(3)
///     .base_delay(Duration::from_millis(200))
///     .request_timeout(Duration::from_secs(30))
///     .default_header("x-directory", "/repo")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            credentials: None,
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Creates a builder seeded from the environment.
    ///
    /// Reads, when set:
    /// - `PALAVER_BASE_URL` - overrides the default host
    /// - `PALAVER_TOKEN` - bearer token attached to every request
    /// - `PALAVER_MAX_RETRIES` - retry cap
    /// - `PALAVER_TIMEOUT_SECS` - per-attempt timeout in seconds
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if a variable is set but empty or unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::new();

        if let Some(url) = env_var("PALAVER_BASE_URL")? {
            builder = builder.base_url(url)?;
        }
        if let Some(token) = env_var("PALAVER_TOKEN")? {
            builder = builder.bearer_token(token);
        }
        if let Some(retries) = env_var("PALAVER_MAX_RETRIES")? {
            let retries: u32 = retries.parse().map_err(|e| ConfigError::Env {
                name: "PALAVER_MAX_RETRIES",
                reason: format!("{}", e),
            })?;
            builder = builder.max_retries(retries);
        }
        if let Some(secs) = env_var("PALAVER_TIMEOUT_SECS")? {
            let secs: u64 = secs.parse().map_err(|e| ConfigError::Env {
                name: "PALAVER_TIMEOUT_SECS",
                reason: format!("{}", e),
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or cannot carry a path.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self, ConfigError> {
        let url = Url::parse(url.as_ref())?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::NotABase(url.to_string()));
        }
        self.base_url = Some(url);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, ConfigError> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| ConfigError::InvalidHeader(format!("name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| ConfigError::InvalidHeader(format!("value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the `User-Agent` sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid header value.
    pub fn user_agent(self, agent: impl AsRef<str>) -> Result<Self, ConfigError> {
        self.default_header(USER_AGENT.as_str(), agent)
    }

    /// Attaches `credentials` to every request.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Attaches a bearer token to every request.
    ///
    /// A leading `Bearer ` prefix is accepted and not duplicated.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        let token = token.as_ref().trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();
        self.credentials(Credentials::Bearer(token.to_string()))
    }

    /// Attaches HTTP basic credentials to every request.
    pub fn basic_auth(self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials(Credentials::Basic {
            username: username.into(),
            password,
        })
    }

    /// Caps retries after the first attempt. `0` disables retrying.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.retry.base_delay = delay;
        self
    }

    /// Sets the upper bound on any single retry delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.retry.max_delay = delay;
        self
    }

    /// Enables or disables retry jitter.
    pub fn jitter(mut self, jitter: bool) -> Self {
        self.retry.jitter = jitter;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the configured [`Client`].
    ///
    /// # Errors
    ///
    /// Returns an error if the default URL or credentials are invalid, or if the
    /// HTTP client cannot be constructed.
    pub fn build(self) -> Result<Client, ConfigError> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)?,
        };

        if let Some(credentials) = &self.credentials {
            validate_credentials(credentials)?;
        }

        // 3xx must reach the classifier as an API error.
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let config = ClientConfig {
            base_url,
            default_headers: self.default_headers,
            credentials: self.credentials,
            max_retries: self.retry.max_retries,
            base_delay: self.retry.base_delay,
            max_delay: self.retry.max_delay,
            jitter: self.retry.jitter,
            request_timeout: self.request_timeout,
        };

        tracing::debug!(config = ?config, "Built client");

        Ok(Client {
            inner: Arc::new(ClientInner {
                http_client,
                config,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies `credentials` to an outgoing request.
pub(crate) fn apply_credentials(
    request: reqwest::RequestBuilder,
    credentials: &Credentials,
) -> reqwest::RequestBuilder {
    match credentials {
        Credentials::Bearer(token) => request.bearer_auth(token),
        Credentials::Basic { username, password } => request.basic_auth(username, password.as_ref()),
        Credentials::Header { name, value } => request.header(name.as_str(), value.as_str()),
    }
}

fn validate_credentials(credentials: &Credentials) -> Result<(), ConfigError> {
    match credentials {
        Credentials::Bearer(token) => {
            HeaderValue::try_from(format!("Bearer {}", token))
                .map_err(|e| ConfigError::InvalidHeader(format!("{}: {}", AUTHORIZATION, e)))?;
        }
        Credentials::Basic { .. } => {}
        Credentials::Header { name, value } => {
            HeaderName::try_from(name.as_str())
                .map_err(|e| ConfigError::InvalidHeader(format!("name: {}", e)))?;
            HeaderValue::try_from(value.as_str())
                .map_err(|e| ConfigError::InvalidHeader(format!("value: {}", e)))?;
        }
    }
    Ok(())
}

fn env_var(name: &'static str) -> Result<Option<String>, ConfigError> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::Env {
            name,
            reason: "set but empty".to_string(),
        }),
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::Env {
            name,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let client = ClientBuilder::new().build().unwrap();
        let config = client.config();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:4096/");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ClientBuilder::new().base_url("not a url"),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            ClientBuilder::new().base_url("mailto:someone@example.com"),
            Err(ConfigError::NotABase(_))
        ));
    }

    #[test]
    fn test_invalid_header() {
        assert!(matches!(
            ClientBuilder::new().default_header("bad header", "x"),
            Err(ConfigError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_bearer_prefix_is_normalized() {
        let client = ClientBuilder::new().bearer_token("Bearer abc").build().unwrap();
        assert_eq!(
            client.config().credentials,
            Some(Credentials::Bearer("abc".to_string()))
        );
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let client = ClientBuilder::new()
            .bearer_token("super-secret")
            .build()
            .unwrap();
        let rendered = format!("{:?}", client.config());
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_retry_policy_follows_config() {
        let client = ClientBuilder::new()
            .max_retries(0)
            .base_delay(Duration::from_millis(10))
            .max_delay(Duration::from_millis(20))
            .jitter(false)
            .build()
            .unwrap();
        let policy = client.config().retry_policy();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.delay_for(5), Duration::from_millis(20));
    }
}
