//! reqwest-backed [`Transport`] with retry and compression.

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{is_retryable_status, Error, ErrorKind, Result};
use crate::request::{HttpRequest, RequestBody};
use crate::response::HttpResponse;
use crate::retry::RetryPolicy;
use crate::transport::Transport;

/// HTTP client for Salesforce APIs with built-in retry and compression.
///
/// Throttling (429) and transient server errors (500, 502, 503, 504) are
/// retried according to the configured [`RetryConfig`](crate::RetryConfig).
/// Every other status is returned to the caller untouched.
#[derive(Debug, Clone)]
pub struct SfHttpClient {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl SfHttpClient {
    /// Create a new HTTP client.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.accept_compressed)
            .deflate(config.accept_compressed)
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    /// Create a new HTTP client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Execute a request with automatic retry handling.
    #[instrument(skip(self, request), fields(method = %request.method(), url = %request.url()))]
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut retry_policy = self
            .config
            .retry
            .as_ref()
            .map(|c| RetryPolicy::new(c.clone()));

        loop {
            let result = self.execute_once(request).await;

            let (retry_after, reason) = match &result {
                Ok(response) if is_retryable_status(response.status()) => {
                    (response.retry_after(), format!("status {}", response.status()))
                }
                Err(err) if err.is_retryable() => (err.retry_after(), err.to_string()),
                _ => return result,
            };

            let Some(policy) = retry_policy.as_mut() else {
                // No retry policy configured
                return result;
            };

            match policy.next_delay(retry_after) {
                Some(delay) => {
                    warn!(
                        attempt = policy.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let attempts = policy.attempt();
                    warn!(attempts, reason = %reason, "Retry attempts exhausted");
                    // The last response still carries the Salesforce error body.
                    return match result {
                        Ok(response) => Ok(response),
                        Err(err) => Err(Error::with_source(
                            ErrorKind::RetriesExhausted { attempts },
                            err,
                        )),
                    };
                }
            }
        }
    }

    /// Execute a single request without retry logic.
    async fn execute_once(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut req = self
            .inner
            .request(request.method().to_reqwest(), request.url());

        if let Some(token) = request.bearer_token() {
            req = req.bearer_auth(token);
        }

        for (name, value) in request.headers() {
            req = req.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body() {
            req = match body {
                RequestBody::Json(value) => req.body(serde_json::to_vec(value)?),
                RequestBody::Text(text) => req.body(text.clone()),
            };
        }

        if self.config.enable_tracing {
            debug!(method = %request.method(), url = %request.url(), "Sending request");
        }

        let response = req.send().await?;
        let status = response.status().as_u16();

        let mut headers = Vec::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.push((name.as_str().to_string(), value.to_string()));
            }
        }

        let body = response.text().await?;

        if self.config.enable_tracing {
            if (200..300).contains(&status) {
                debug!(status, content_length = body.len(), "Response received");
            } else {
                info!(status, content_length = body.len(), "Non-success response");
            }
        }

        Ok(headers
            .into_iter()
            .fold(HttpResponse::new(status, body), |resp, (name, value)| {
                resp.with_header(name, value)
            }))
    }
}

#[async_trait]
impl Transport for SfHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute(&request).await
    }
}
