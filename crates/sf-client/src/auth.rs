//! The authentication seam and the per-operation [`Session`].
//!
//! How an access token is obtained or refreshed is up to the
//! [`Authenticator`] implementation. This crate only consumes the result.

use async_trait::async_trait;

use crate::error::{Error, ErrorKind, Result};
use crate::request::{HttpRequest, RequestMethod};

/// Supplies the instance URL and bearer token for an operation.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Return the session to use for the next operation.
    async fn session(&self) -> Result<Session>;
}

/// Credentials pinned for the duration of one operation.
///
/// The access token is redacted in Debug output to prevent accidental
/// exposure in logs.
#[derive(Clone)]
pub struct Session {
    instance_url: String,
    access_token: String,
    api_version: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url)
            .field("access_token", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl Session {
    /// Create a session. A trailing slash on the instance URL is ignored.
    pub fn new(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            instance_url: instance_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            api_version: api_version.into(),
        }
    }

    /// Replace the API version (e.g., "62.0").
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Path of the data API relative to the instance, e.g. `/services/data/v62.0`.
    ///
    /// Composite subrequest URLs are expressed relative to the instance
    /// and start with this prefix.
    pub fn data_path(&self) -> String {
        format!("/services/data/v{}", self.api_version)
    }

    /// Build the REST API URL for a path.
    ///
    /// Example: `rest_url("sobjects/Account")` -> `{instance}/services/data/v62.0/sobjects/Account`
    pub fn rest_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}{}/{}", self.instance_url, self.data_path(), path)
    }

    /// Build the Bulk API 2.0 URL for a path under `/jobs/`.
    pub fn bulk_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}{}/jobs/{}", self.instance_url, self.data_path(), path)
    }

    // =========================================================================
    // Authenticated request builders
    // =========================================================================

    pub fn get(&self, url: impl Into<String>) -> HttpRequest {
        self.request(RequestMethod::Get, url)
    }

    pub fn post(&self, url: impl Into<String>) -> HttpRequest {
        self.request(RequestMethod::Post, url)
    }

    pub fn patch(&self, url: impl Into<String>) -> HttpRequest {
        self.request(RequestMethod::Patch, url)
    }

    pub fn put(&self, url: impl Into<String>) -> HttpRequest {
        self.request(RequestMethod::Put, url)
    }

    pub fn delete(&self, url: impl Into<String>) -> HttpRequest {
        self.request(RequestMethod::Delete, url)
    }

    fn request(&self, method: RequestMethod, url: impl Into<String>) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
    }
}

/// Serves a fixed instance URL and token.
#[derive(Clone)]
pub struct StaticAuthenticator {
    session: Session,
}

impl std::fmt::Debug for StaticAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAuthenticator")
            .field("session", &self.session)
            .finish()
    }
}

impl StaticAuthenticator {
    /// Create an authenticator after validating the instance URL.
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let instance_url = instance_url.into();
        let parsed = url::Url::parse(&instance_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::new(ErrorKind::InvalidUrl(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            ))));
        }

        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(Error::new(ErrorKind::Config(
                "access token must not be empty".to_string(),
            )));
        }

        Ok(Self {
            session: Session::new(instance_url, access_token, crate::DEFAULT_API_VERSION),
        })
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn session(&self) -> Result<Session> {
        Ok(self.session.clone())
    }
}
