//! HTTP response handling with Salesforce-specific extensions.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;
use serde::de::DeserializeOwned;

use crate::error::{Error, ErrorKind, Result};

/// Raw response returned by a [`Transport`](crate::Transport): status,
/// headers (names lowercased) and the full body as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: String,
}

impl HttpResponse {
    /// Create a response with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Attach a header. Names are stored lowercased for case-insensitive lookup.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Get the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Get the Retry-After header as a Duration (seconds form only).
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }

    /// Get the response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consume the response and return its body.
    pub fn into_text(self) -> String {
        self.body
    }

    /// Deserialize the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(Into::into)
    }

    /// Return the response if its status equals `expected`, otherwise decode
    /// the body into an API error.
    pub fn expect_status(self, expected: u16) -> Result<Self> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Return the response if it is 2xx, otherwise decode the body into an
    /// API error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }

    /// Convert this response into an error, decoding the Salesforce
    /// structured error body when present.
    pub fn into_error(self) -> Error {
        parse_error_response(self.status, &self.body)
    }

    /// Get API usage limits from response headers.
    pub fn api_usage(&self) -> Option<ApiUsage> {
        // Salesforce returns usage in Sforce-Limit-Info header
        // Format: "api-usage=25/15000"
        let info = self.header("sforce-limit-info")?;

        for part in info.split(',') {
            if let Some(usage) = part.trim().strip_prefix("api-usage=") {
                let (used, limit) = usage.split_once('/')?;
                return Some(ApiUsage {
                    used: used.parse().ok()?,
                    limit: limit.parse().ok()?,
                });
            }
        }

        None
    }
}

/// API usage information from response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiUsage {
    /// Number of API calls used.
    pub used: u64,
    /// Total API call limit.
    pub limit: u64,
}

impl ApiUsage {
    /// Get the remaining API calls.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Get the usage percentage.
    pub fn percentage(&self) -> f64 {
        if self.limit == 0 {
            100.0
        } else {
            (self.used as f64 / self.limit as f64) * 100.0
        }
    }
}

/// Parse an error response body and convert to the appropriate error kind.
fn parse_error_response(status: u16, body: &str) -> Error {
    if status == 429 {
        return Error::new(ErrorKind::RateLimited { retry_after: None });
    }

    // Array format: [{"errorCode": ..., "message": ...}, ...]
    if let Ok(errors) = serde_json::from_str::<Vec<SalesforceErrorResponse>>(body) {
        if let Some(first) = errors.first() {
            let message = errors
                .iter()
                .map(|e| redact_sensitive(&e.message))
                .collect::<Vec<_>>()
                .join("; ");
            return Error::new(ErrorKind::SalesforceApi {
                status,
                error_code: first.error_code.clone(),
                message,
                fields: errors
                    .iter()
                    .flat_map(|e| e.fields.iter().flatten().cloned())
                    .collect(),
            });
        }
    }

    if let Ok(err) = serde_json::from_str::<SalesforceErrorResponse>(body) {
        return Error::new(ErrorKind::SalesforceApi {
            status,
            error_code: err.error_code,
            message: redact_sensitive(&err.message),
            fields: err.fields.unwrap_or_default(),
        });
    }

    let sanitized = if body.trim().is_empty() {
        format!("unexpected status {}", status)
    } else {
        sanitize_error_message(body)
    };
    let kind = match status {
        401 => ErrorKind::Authentication(sanitized),
        403 => ErrorKind::Authorization(sanitized),
        404 => ErrorKind::NotFound(sanitized),
        _ => ErrorKind::Http {
            status,
            message: sanitized,
        },
    };

    Error::new(kind)
}

// Salesforce tokens start with the 15-char org id followed by '!'.
static TOKEN_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"00[A-Za-z0-9]{13,}[!][A-Za-z0-9_.]+").ok());
static SESSION_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"sid=[A-Za-z0-9]{20,}").ok());

/// Redact access tokens and session ids, keeping the rest of the message.
///
/// Used for messages decoded from a Salesforce error body, which are kept
/// whole so aggregated failures lose nothing.
pub fn redact_sensitive(message: &str) -> String {
    let mut redacted = message.to_string();

    if let Some(re) = TOKEN_PATTERN.as_ref() {
        redacted = re.replace_all(&redacted, "[REDACTED_TOKEN]").into_owned();
    }
    if let Some(re) = SESSION_PATTERN.as_ref() {
        redacted = re.replace_all(&redacted, "sid=[REDACTED]").into_owned();
    }

    redacted
}

/// Sanitize a raw response body before it is used as an error message.
///
/// Access tokens and session ids are redacted and bodies longer than
/// 500 characters are truncated.
pub fn sanitize_error_message(message: &str) -> String {
    const MAX_LENGTH: usize = 500;

    let mut sanitized = redact_sensitive(message);

    if sanitized.len() > MAX_LENGTH {
        let mut cut = MAX_LENGTH;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str("...[truncated]");
    }

    sanitized
}

/// Salesforce API error response format.
#[derive(Debug, serde::Deserialize)]
struct SalesforceErrorResponse {
    #[serde(rename = "errorCode", alias = "statusCode")]
    error_code: String,
    message: String,
    fields: Option<Vec<String>>,
}
