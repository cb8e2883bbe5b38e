//! Per-call DML options.

use crate::batch::MAX_COLLECTION_BATCH_SIZE;
use crate::error::{Error, Result};

/// Options for collection and composite DML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmlOptions {
    /// Roll back the whole batch (or composite transaction) when any record fails.
    pub all_or_none: bool,
    /// Records per collection batch. At most 200.
    pub batch_size: usize,
}

impl Default for DmlOptions {
    fn default() -> Self {
        Self {
            all_or_none: false,
            batch_size: MAX_COLLECTION_BATCH_SIZE,
        }
    }
}

impl DmlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_all_or_none(mut self, all_or_none: bool) -> Self {
        self.all_or_none = all_or_none;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Check the batch size against the collection limit.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::validation("batch size must be positive"));
        }
        if self.batch_size > MAX_COLLECTION_BATCH_SIZE {
            return Err(Error::validation(format!(
                "batch size {} exceeds the collection limit of {}",
                self.batch_size, MAX_COLLECTION_BATCH_SIZE
            )));
        }
        Ok(())
    }
}
