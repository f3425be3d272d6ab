//! Per-call request description.
//!
//! A [`RequestSpec`] is the triple every endpoint maps onto: an HTTP method, a path with
//! resource identifiers substituted in, a query, and an optional JSON body. It is built
//! once per call and never mutated afterwards; all parameter validation happens in
//! [`RequestSpecBuilder::build`], before any I/O.

use crate::query::{Query, QueryEncoder, ToQuery};
use crate::{Error, Result};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::time::Duration;

/// A validated, immutable description of one call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    segments: Vec<String>,
    query: Query,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl RequestSpec {
    /// Starts a spec for `method` on a path template such as `/session/{id}/message`.
    ///
    /// # Examples
    ///
    /// ```
    /// use palaver::RequestSpec;
    /// use http::Method;
    ///
    /// let spec = RequestSpec::builder(Method::GET, "/session/{id}/message")
    ///     .path_param("id", "ses_123")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(spec.path(), "/session/ses_123/message");
    /// ```
    pub fn builder(method: Method, template: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder::new(method, template)
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The decoded path segments, after substitution.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The substituted path, unencoded, with a leading `/`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// The encoded query parameters.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// The serialized JSON body, if any.
    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Headers added to this call only.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A per-attempt timeout overriding the client's default.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// Builder for [`RequestSpec`].
///
/// Errors are collected lazily and reported by [`build`](RequestSpecBuilder::build), so a
/// chain of calls reads the same whether or not an intermediate step failed. The first
/// error wins.
#[derive(Debug)]
pub struct RequestSpecBuilder {
    method: Method,
    template: String,
    path_params: Vec<(String, String)>,
    query: Query,
    body: Option<serde_json::Value>,
    headers: HeaderMap,
    timeout: Option<Duration>,
    error: Option<Error>,
}

impl RequestSpecBuilder {
    fn new(method: Method, template: impl Into<String>) -> Self {
        Self {
            method,
            template: template.into(),
            path_params: Vec::new(),
            query: Query::new(),
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
            error: None,
        }
    }

    fn fail(&mut self, error: Error) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Binds a `{name}` placeholder in the path template.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.push((name.into(), value.into()));
        self
    }

    /// Encodes `params` and appends them to the query.
    pub fn query<P: ToQuery + ?Sized>(mut self, params: &P) -> Self {
        match QueryEncoder::encode(params) {
            Ok(query) => self.query.extend(query),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Appends an already-encoded query.
    pub fn raw_query(mut self, query: Query) -> Self {
        self.query.extend(query);
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(value),
            Err(e) => self.fail(Error::param("body", e.to_string())),
        }
        self
    }

    /// Adds a header to this call only.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let name = match HeaderName::try_from(name.as_ref()) {
            Ok(name) => name,
            Err(e) => {
                self.fail(Error::param(name.as_ref(), format!("invalid header name: {}", e)));
                return self;
            }
        };
        match HeaderValue::try_from(value.as_ref()) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(e) => {
                self.fail(Error::param(name.as_str(), format!("invalid header value: {}", e)))
            }
        }
        self
    }

    /// Sets a per-attempt timeout tighter (or looser) than the client's default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates path parameters and produces the immutable spec.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParamValidation`] if a placeholder is unbound or bound to an empty
    /// value, if a bound name does not appear in the template, or if an earlier builder
    /// step failed.
    pub fn build(self) -> Result<RequestSpec> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut used = vec![false; self.path_params.len()];
        let mut segments = Vec::new();

        for raw in self.template.split('/').filter(|s| !s.is_empty()) {
            let Some(name) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                segments.push(raw.to_string());
                continue;
            };

            let position = self.path_params.iter().position(|(n, _)| n == name);
            let Some(index) = position else {
                return Err(Error::param(name, "path parameter is not bound"));
            };
            used[index] = true;

            let value = &self.path_params[index].1;
            if value.trim().is_empty() {
                return Err(Error::param(name, "path parameter must not be empty"));
            }
            if value == "." || value == ".." {
                return Err(Error::param(name, "path parameter must not be a dot segment"));
            }
            segments.push(value.clone());
        }

        if let Some(index) = used.iter().position(|u| !u) {
            return Err(Error::param(
                self.path_params[index].0.clone(),
                "path parameter does not appear in the path template",
            ));
        }

        Ok(RequestSpec {
            method: self.method,
            segments,
            query: self.query,
            body: self.body,
            headers: self.headers,
            timeout: self.timeout,
        })
    }
}
