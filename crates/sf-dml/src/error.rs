//! Error types for sf-dataload-dml.

use sf_dataload_client::ErrorKind as ClientErrorKind;

use crate::aggregate::AggregateError;

/// Result type alias for DML operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for DML operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a [`ErrorKind::Validation`] error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    /// Returns true if this error was raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Validation(_)
                | ErrorKind::MissingIdentifier { .. }
                | ErrorKind::SubrequestLimit { .. }
        )
    }

    /// Returns the aggregated per-record failures, if this is an aggregate error.
    pub fn aggregate(&self) -> Option<&AggregateError> {
        match &self.kind {
            ErrorKind::Aggregate(agg) => Some(agg),
            _ => None,
        }
    }

    /// Returns the HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Api { status, .. } => *status,
            _ => None,
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Malformed input or configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record lacks the field that identifies it for the operation.
    #[error("Validation error: {sobject} record at index {index} is missing required field {field}")]
    MissingIdentifier {
        sobject: String,
        field: String,
        index: usize,
    },

    /// The composite request would exceed the subrequest ceiling.
    #[error("Validation error: {batches} batches exceed the composite limit of {max} subrequests")]
    SubrequestLimit { batches: usize, max: usize },

    /// Payload marshaling failed.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The service could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an unexpected status.
    #[error("API error: {}{message}", error_code.as_ref().map(|c| format!("{}: ", c)).unwrap_or_default())]
    Api {
        status: Option<u16>,
        error_code: Option<String>,
        message: String,
    },

    /// Several per-record or per-batch failures.
    #[error("{0}")]
    Aggregate(AggregateError),
}

impl From<sf_dataload_client::Error> for Error {
    fn from(err: sf_dataload_client::Error) -> Self {
        let kind = if err.is_transport() {
            ErrorKind::Transport(err.to_string())
        } else {
            match &err.kind {
                ClientErrorKind::Json(msg) => ErrorKind::Encoding(msg.clone()),
                ClientErrorKind::InvalidUrl(msg) | ClientErrorKind::Config(msg) => {
                    ErrorKind::Validation(msg.clone())
                }
                ClientErrorKind::SalesforceApi {
                    status,
                    error_code,
                    message,
                    ..
                } => ErrorKind::Api {
                    status: Some(*status),
                    error_code: Some(error_code.clone()),
                    message: message.clone(),
                },
                _ => ErrorKind::Api {
                    status: err.status(),
                    error_code: None,
                    message: err.to_string(),
                },
            }
        };
        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Encoding(err.to_string()), err)
    }
}

impl From<AggregateError> for Error {
    fn from(err: AggregateError) -> Self {
        Error::new(ErrorKind::Aggregate(err))
    }
}
