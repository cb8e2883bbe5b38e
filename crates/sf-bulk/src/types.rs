//! Types for Bulk API 2.0 ingest jobs.

use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize API version that can be either a float (62.0) or string ("62.0").
pub(crate) fn deserialize_api_version<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ApiVersion {
        Float(f64),
        String(String),
    }

    Option::<ApiVersion>::deserialize(deserializer).map(|opt| {
        opt.map(|v| match v {
            ApiVersion::Float(f) => format!("{:.1}", f),
            ApiVersion::String(s) => s,
        })
    })
}

/// Ingest job states.
///
/// The server creates jobs `Open`. The client moves them to
/// `UploadComplete` after the data upload, or to `Aborted` when the upload
/// fails. The server drives them through `InProgress` to `JobComplete` or
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Open,
    UploadComplete,
    InProgress,
    Aborted,
    JobComplete,
    Failed,
}

impl JobState {
    /// Check if job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        match self {
            JobState::Aborted | JobState::JobComplete | JobState::Failed => true,
            JobState::Open | JobState::UploadComplete | JobState::InProgress => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Open => "Open",
            JobState::UploadComplete => "UploadComplete",
            JobState::InProgress => "InProgress",
            JobState::Aborted => "Aborted",
            JobState::JobComplete => "JobComplete",
            JobState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ingest operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BulkOperation {
    Insert,
    Update,
    /// Upsert based on external ID
    Upsert,
    /// Delete records (soft delete)
    Delete,
    /// Delete records permanently, bypassing the recycle bin
    HardDelete,
}

impl BulkOperation {
    /// Get the API string for this operation.
    pub fn api_name(&self) -> &'static str {
        match self {
            BulkOperation::Insert => "insert",
            BulkOperation::Update => "update",
            BulkOperation::Upsert => "upsert",
            BulkOperation::Delete => "delete",
            BulkOperation::HardDelete => "hardDelete",
        }
    }

    /// Returns true if every record must carry an `Id`.
    pub fn requires_id(&self) -> bool {
        matches!(
            self,
            BulkOperation::Update | BulkOperation::Delete | BulkOperation::HardDelete
        )
    }
}

impl std::fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.api_name())
    }
}

/// Line ending style for Bulk API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LineEnding {
    /// Unix-style (LF)
    #[default]
    #[serde(rename = "LF")]
    Lf,
    /// Windows-style (CRLF)
    #[serde(rename = "CRLF")]
    Crlf,
}

/// Column delimiter for Bulk API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ColumnDelimiter {
    #[default]
    #[serde(rename = "COMMA")]
    Comma,
    #[serde(rename = "TAB")]
    Tab,
    #[serde(rename = "SEMICOLON")]
    Semicolon,
    #[serde(rename = "PIPE")]
    Pipe,
    #[serde(rename = "BACKQUOTE")]
    Backquote,
    #[serde(rename = "CARET")]
    Caret,
}

impl ColumnDelimiter {
    /// The delimiter as the single byte the CSV writer expects.
    pub fn byte(&self) -> u8 {
        match self {
            ColumnDelimiter::Comma => b',',
            ColumnDelimiter::Tab => b'\t',
            ColumnDelimiter::Semicolon => b';',
            ColumnDelimiter::Pipe => b'|',
            ColumnDelimiter::Backquote => b'`',
            ColumnDelimiter::Caret => b'^',
        }
    }
}

// =============================================================================
// Request Types
// =============================================================================

/// Request to create an ingest job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngestJobRequest {
    /// SObject API name
    pub object: String,
    pub operation: BulkOperation,
    /// External ID field for upsert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_field_name: Option<String>,
    pub content_type: String,
    pub column_delimiter: ColumnDelimiter,
    pub line_ending: LineEnding,
}

impl CreateIngestJobRequest {
    pub fn new(sobject: impl Into<String>, operation: BulkOperation) -> Self {
        Self {
            object: sobject.into(),
            operation,
            external_id_field_name: None,
            content_type: "CSV".to_string(),
            column_delimiter: ColumnDelimiter::default(),
            line_ending: LineEnding::default(),
        }
    }

    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field_name = Some(field.into());
        self
    }

    pub fn with_column_delimiter(mut self, delimiter: ColumnDelimiter) -> Self {
        self.column_delimiter = delimiter;
        self
    }

    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }
}

/// Request to move a job to a new state.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateJobStateRequest {
    pub state: JobState,
}

impl UpdateJobStateRequest {
    pub fn upload_complete() -> Self {
        Self {
            state: JobState::UploadComplete,
        }
    }

    pub fn abort() -> Self {
        Self {
            state: JobState::Aborted,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Ingest job info.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestJob {
    #[serde(default)]
    pub id: String,
    pub state: JobState,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub operation: Option<BulkOperation>,
    #[serde(default)]
    pub external_id_field_name: Option<String>,
    #[serde(default)]
    pub number_records_processed: u64,
    #[serde(default)]
    pub number_records_failed: u64,
    #[serde(default)]
    pub created_date: Option<String>,
    #[serde(default)]
    pub system_modstamp: Option<String>,
    /// Total processing time in milliseconds
    #[serde(default)]
    pub total_processing_time: Option<u64>,
    /// API version (can be float like 62.0 or string like "62.0")
    #[serde(default, deserialize_with = "deserialize_api_version")]
    pub api_version: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl IngestJob {
    /// The server's error message, if one was given and is not blank.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// A job's final info together with its result reports.
#[derive(Debug, Clone)]
pub struct IngestJobResult {
    pub job: IngestJob,
    /// Successful records CSV
    pub successful_results: String,
    /// Failed records CSV
    pub failed_results: String,
}

impl IngestJobResult {
    pub fn is_success(&self) -> bool {
        self.job.state == JobState::JobComplete && !self.has_failures()
    }

    pub fn has_failures(&self) -> bool {
        self.job.number_records_failed > 0
    }

    /// Share of processed records that succeeded.
    pub fn success_rate(&self) -> f64 {
        let processed = self.job.number_records_processed;
        if processed == 0 {
            return 1.0;
        }
        let succeeded = processed.saturating_sub(self.job.number_records_failed);
        succeeded as f64 / processed as f64
    }
}
