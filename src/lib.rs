//! # Palaver - typed request core for a conversational-agent HTTP service
//!
//! Every endpoint of the agent service (sessions, files, tools, configuration, UI
//! control) reduces to the same pipeline: turn typed parameters into a path, query and
//! JSON body; run the exchange with retries; classify the outcome; decode the body.
//! This crate is that pipeline.
//!
//! ## Quick Start
//!
//! ```no_run
//! use palaver::query::{QueryEncoder, ToQuery};
//! use palaver::{Client, RequestSpec, ToolState};
//! use http::Method;
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! struct MessageQuery {
//!     directory: Option<String>,
//!     limit: Option<u32>,
//! }
//!
//! impl ToQuery for MessageQuery {
//!     fn encode(&self, enc: &mut QueryEncoder) -> palaver::Result<()> {
//!         enc.optional("directory", self.directory.as_deref());
//!         enc.optional("limit", self.limit.as_ref());
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Deserialize)]
//! struct ToolPart {
//!     tool: String,
//!     state: ToolState,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::builder()
//!         .base_url("http://127.0.0.1:4096")?
//!         .bearer_token("secret")
//!         .max_retries(3)
//!         .request_timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     let spec = RequestSpec::builder(Method::GET, "/session/{id}/tools")
//!         .path_param("id", "ses_123")
//!         .query(&MessageQuery { directory: None, limit: Some(20) })
//!         .build()?;
//!
//!     let parts = client.execute::<Vec<ToolPart>>(spec).await?;
//!     for part in parts.iter() {
//!         match &part.state {
//!             ToolState::Completed(done) => println!("{}: {}", part.tool, done.output),
//!             ToolState::Error(failed) => println!("{} failed: {}", part.tool, failed.error),
//!             other => println!("{}: {:?}", part.tool, other.status()),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Calls fail with exactly one of four [`Error`] variants:
//!
//! - [`Error::ParamValidation`] - rejected locally, nothing was sent
//! - [`Error::Transport`] - no response (network, timeout, deadline, cancellation)
//! - [`Error::Api`] - non-2xx status, raw body attached
//! - [`Error::Decode`] - 2xx body did not match the requested shape
//!
//! ## Retries
//!
//! Transport failures and 5xx responses are retried with capped exponential backoff and
//! jitter, up to [`ClientBuilder::max_retries`] times. 4xx responses, 429 included, are
//! returned immediately. Response headers such as `Retry-After` are not consulted.

pub mod classify;
mod client;
mod config;
pub mod decode;
mod error;
pub mod query;
mod request;
mod response;
pub mod retry;
mod tool_state;

pub use client::{CallOptions, Client};
pub use config::{ClientBuilder, ClientConfig, ConfigError, Credentials};
pub use decode::{Discriminated, Variant};
pub use error::{Error, Result, TransportCause};
pub use query::{ArrayFormat, Query, QueryEncoder, ToQuery};
pub use request::{RequestSpec, RequestSpecBuilder};
pub use response::Response;
pub use retry::{RetryDecision, RetryPolicy};
pub use tool_state::{
    SpanTime, StartTime, ToolState, ToolStateCompleted, ToolStateError, ToolStatePending,
    ToolStateRunning,
};
