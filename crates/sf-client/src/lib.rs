//! # sf-dataload-client
//!
//! HTTP infrastructure for the Salesforce record APIs.
//!
//! This crate provides the two seams the DML and bulk layers are written
//! against, plus default implementations:
//! - [`Transport`]: executes a request and returns the raw status, headers
//!   and body. [`SfHttpClient`] is the reqwest-backed implementation with
//!   retry (exponential backoff with jitter, `Retry-After` support) and
//!   gzip/deflate compression.
//! - [`Authenticator`]: supplies a [`Session`] (instance URL, bearer token,
//!   API version). [`StaticAuthenticator`] serves a fixed pair.
//!
//! Non-2xx responses are never converted to errors by the transport.
//! Callers classify them with [`HttpResponse::expect_status`] or
//! [`HttpResponse::into_error`], which decode Salesforce's structured
//! `[{errorCode, message, fields}]` error body.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            DmlExecutor / BulkJobController                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SalesforceClient                          │
//! │  - Arc<dyn Authenticator> -> Session (urls, bearer auth)    │
//! │  - Arc<dyn Transport>     -> HttpResponse                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SfHttpClient                             │
//! │  - Raw HTTP with retry, compression, rate limiting          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use sf_dataload_client::SalesforceClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sf_dataload_client::Error> {
//!     let client = SalesforceClient::new("https://na1.salesforce.com", "00D...!AQ...")?;
//!     let session = client.session().await?;
//!
//!     let limits = client
//!         .send(session.get(session.rest_url("limits")))
//!         .await?
//!         .expect_status(200)?;
//!
//!     println!("{}", limits.body());
//!     Ok(())
//! }
//! ```

mod auth;
mod client;
mod config;
mod error;
mod request;
mod response;
mod retry;
mod salesforce_client;
mod transport;

pub use auth::{Authenticator, Session, StaticAuthenticator};
pub use client::SfHttpClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use request::{HttpRequest, RequestBody, RequestMethod};
pub use response::{redact_sensitive, sanitize_error_message, ApiUsage, HttpResponse};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};
pub use salesforce_client::SalesforceClient;
pub use transport::Transport;

/// Default Salesforce API version
pub const DEFAULT_API_VERSION: &str = "62.0";

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("sf-dataload/", env!("CARGO_PKG_VERSION"));
