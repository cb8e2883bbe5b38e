//! Per-call ingest options.

use crate::error::{Error, Result};
use crate::types::{ColumnDelimiter, LineEnding};

/// Records per job for [`execute_batched`](crate::BulkJobController::execute_batched).
pub const DEFAULT_JOB_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOptions {
    /// Field matched on by upsert jobs. Required for upsert.
    pub external_id_field: Option<String>,
    /// Poll the job to a terminal state before returning.
    pub wait_for_results: bool,
    pub column_delimiter: ColumnDelimiter,
    pub line_ending: LineEnding,
    /// Records per job when one call is split across several jobs.
    pub batch_size: usize,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            external_id_field: None,
            wait_for_results: true,
            column_delimiter: ColumnDelimiter::default(),
            line_ending: LineEnding::default(),
            batch_size: DEFAULT_JOB_BATCH_SIZE,
        }
    }
}

impl BulkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field = Some(field.into());
        self
    }

    pub fn with_wait_for_results(mut self, wait: bool) -> Self {
        self.wait_for_results = wait;
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

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::validation("batch size must be positive"));
        }
        if let Some(field) = &self.external_id_field {
            if field.trim().is_empty() {
                return Err(Error::validation("external id field name must not be empty"));
            }
        }
        Ok(())
    }
}
