//! High-level Salesforce client composing a transport with an authenticator.
//!
//! ## Security
//!
//! - Access tokens live only inside [`Session`] values and are redacted in
//!   Debug output
//! - Sensitive parameters are skipped in tracing spans

use std::sync::Arc;

use tracing::instrument;

use crate::auth::{Authenticator, Session, StaticAuthenticator};
use crate::client::SfHttpClient;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::Transport;

/// High-level Salesforce API client.
///
/// Cheap to clone; clones share the transport and authenticator. Used by
/// the DML executor and the bulk job controller.
///
/// # Example
///
/// ```rust,ignore
/// use sf_dataload_client::SalesforceClient;
///
/// let client = SalesforceClient::new("https://na1.salesforce.com", token)?;
/// let session = client.session().await?;
/// let response = client
///     .send(session.get(session.rest_url("limits")))
///     .await?;
/// ```
#[derive(Clone)]
pub struct SalesforceClient {
    transport: Arc<dyn Transport>,
    auth: Arc<dyn Authenticator>,
    api_version: Option<String>,
}

impl std::fmt::Debug for SalesforceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesforceClient")
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl SalesforceClient {
    /// Create a new Salesforce client with the given instance URL and access token.
    pub fn new(instance_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Self::with_config(instance_url, access_token, ClientConfig::default())
    }

    /// Create a new Salesforce client with custom configuration.
    pub fn with_config(
        instance_url: impl Into<String>,
        access_token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport = SfHttpClient::new(config)?;
        let auth = StaticAuthenticator::new(instance_url, access_token)?;
        Ok(Self::from_parts(Arc::new(transport), Arc::new(auth)))
    }

    /// Assemble a client from any transport and authenticator.
    pub fn from_parts(transport: Arc<dyn Transport>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            transport,
            auth,
            api_version: None,
        }
    }

    /// Set the API version (e.g., "62.0"), overriding the authenticator's.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Get the API version override, if any.
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Obtain the session for one operation.
    pub async fn session(&self) -> Result<Session> {
        let session = self.auth.session().await?;
        Ok(match &self.api_version {
            Some(version) => session.with_api_version(version.clone()),
            None => session,
        })
    }

    /// Send a request through the transport and return the raw response.
    #[instrument(skip(self, request), fields(method = %request.method(), url = %request.url()))]
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.transport.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_rejects_invalid_instance_url() {
        let err = SalesforceClient::new("na1.salesforce.com", "token").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_session_uses_api_version_override() {
        let client = SalesforceClient::new("https://na1.salesforce.com/", "token")
            .unwrap()
            .with_api_version("60.0");

        let session = client.session().await.unwrap();
        assert_eq!(session.api_version(), "60.0");
        assert_eq!(
            session.rest_url("sobjects/Account"),
            "https://na1.salesforce.com/services/data/v60.0/sobjects/Account"
        );
    }

    #[test]
    fn test_debug_does_not_expose_token() {
        let client = SalesforceClient::new("https://na1.salesforce.com", "secret-token").unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_send_attaches_bearer_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/services/data/v62.0/limits"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = SalesforceClient::with_config(
            mock_server.uri(),
            "test-token",
            ClientConfig::builder().without_retry().build(),
        )
        .unwrap();

        let session = client.session().await.unwrap();
        let response = client.send(session.get(session.rest_url("limits"))).await.unwrap();
        assert_eq!(response.status(), 200);
    }
}
