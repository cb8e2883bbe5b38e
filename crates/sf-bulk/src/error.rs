//! Error types for sf-dataload-bulk.

use std::time::Duration;

use sf_dataload_client::ErrorKind as ClientErrorKind;
use sf_dataload_dml::ErrorKind as DmlErrorKind;

pub type Result<T> = std::result::Result<T, Error>;

/// Error type for bulk ingest operations.
///
/// Once a job exists on the server, every error returned for it carries
/// the job id so the job can be inspected or cleaned up afterwards.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    /// Id of the job the failure belongs to, if one was created.
    pub job_id: Option<String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            job_id: None,
            source: None,
        }
    }

    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            job_id: None,
            source: Some(Box::new(source)),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    /// Attach the job id, keeping one that is already set.
    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        if self.job_id.is_none() {
            self.job_id = Some(job_id.into());
        }
        self
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::Api { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.kind, ErrorKind::Validation(_))
    }

    /// Returns true if the job itself reached an unsuccessful outcome or
    /// never reached one in time.
    pub fn is_job_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::JobClosedPrematurely(_)
                | ErrorKind::JobFailed(_)
                | ErrorKind::FailedRecords { .. }
                | ErrorKind::FailedRecordCount(_)
                | ErrorKind::Aborted
                | ErrorKind::Timeout(_)
                | ErrorKind::Cancelled
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error: {}{message}", error_code.as_ref().map(|c| format!("{}: ", c)).unwrap_or_default())]
    Api {
        status: Option<u16>,
        error_code: Option<String>,
        message: String,
    },

    /// Job creation did not leave the job open for upload.
    #[error("job closed prematurely: {0}")]
    JobClosedPrematurely(String),

    /// The server's own error message for the job.
    #[error("{0}")]
    JobFailed(String),

    /// Raw failed-records report.
    #[error("{report}")]
    FailedRecords { count: u64, report: String },

    /// Failed records were reported but the report could not be fetched.
    #[error("bulk job reported {0} failed records")]
    FailedRecordCount(u64),

    #[error("bulk job aborted")]
    Aborted,

    #[error("bulk job did not reach a terminal state within {0:?}")]
    Timeout(Duration),

    #[error("bulk job polling cancelled")]
    Cancelled,
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

impl From<sf_dataload_dml::Error> for Error {
    fn from(err: sf_dataload_dml::Error) -> Self {
        let kind = match &err.kind {
            DmlErrorKind::Validation(msg) => ErrorKind::Validation(msg.clone()),
            DmlErrorKind::MissingIdentifier {
                sobject,
                field,
                index,
            } => ErrorKind::Validation(format!(
                "{} record at index {} is missing required field {}",
                sobject, index, field
            )),
            DmlErrorKind::SubrequestLimit { batches, max } => ErrorKind::Validation(format!(
                "{} batches exceed the limit of {}",
                batches, max
            )),
            DmlErrorKind::Encoding(msg) => ErrorKind::Encoding(msg.clone()),
            DmlErrorKind::Transport(msg) => ErrorKind::Transport(msg.clone()),
            DmlErrorKind::Api {
                status,
                error_code,
                message,
            } => ErrorKind::Api {
                status: *status,
                error_code: error_code.clone(),
                message: message.clone(),
            },
            DmlErrorKind::Aggregate(agg) => ErrorKind::Api {
                status: None,
                error_code: None,
                message: agg.to_string(),
            },
        };
        Error::with_source(kind, err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::with_source(ErrorKind::Encoding(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Encoding(err.to_string()), err)
    }
}
