//! Order-preserving record batching.

use crate::error::{Error, Result};

/// Maximum number of records in one sObject Collections request.
pub const MAX_COLLECTION_BATCH_SIZE: usize = 200;

/// Splits an ordered sequence into contiguous batches of at most
/// `batch_size` elements.
///
/// Every batch but the last holds exactly `batch_size` elements; empty
/// input yields no batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordBatcher {
    batch_size: usize,
}

impl RecordBatcher {
    /// Create a batcher. A batch size of zero is a configuration error.
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::validation("batch size must be positive"));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches `len` elements produce.
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.batch_size)
    }

    /// Borrowing iterator over the batches of `records`.
    pub fn batches<'a, T>(&self, records: &'a [T]) -> std::slice::Chunks<'a, T> {
        records.chunks(self.batch_size)
    }

    /// Split an owned sequence into owned batches.
    pub fn split<T>(&self, records: Vec<T>) -> Vec<Vec<T>> {
        let mut batches = Vec::with_capacity(self.batch_count(records.len()));
        let mut iter = records.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(iter.by_ref().take(self.batch_size).collect());
        }
        batches
    }
}
