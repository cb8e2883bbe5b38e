//! Merging per-record and per-batch failures into one error value.

use std::fmt;

use crate::collections::CollectionResult;
use crate::error::{Error, ErrorKind};

/// One failed record, or one failed batch when `record_id` is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub status_code: String,
    pub message: String,
    pub record_id: Option<String>,
}

impl RecordFailure {
    pub fn new(
        status_code: impl Into<String>,
        message: impl Into<String>,
        record_id: Option<String>,
    ) -> Self {
        Self {
            status_code: status_code.into(),
            message: message.into(),
            record_id,
        }
    }

    /// Describe a whole-batch failure (outer status, transport error).
    ///
    /// Aggregates are flattened so a nested aggregate contributes each of
    /// its failures rather than one combined line.
    pub fn from_error(err: &Error) -> Vec<Self> {
        match &err.kind {
            ErrorKind::Aggregate(agg) => agg.failures().to_vec(),
            ErrorKind::Api {
                status,
                error_code,
                message,
            } => {
                let code = error_code
                    .clone()
                    .or_else(|| status.map(|s| s.to_string()))
                    .unwrap_or_else(|| "API_ERROR".to_string());
                vec![Self::new(code, message.clone(), None)]
            }
            ErrorKind::Transport(msg) => vec![Self::new("TRANSPORT_ERROR", msg.clone(), None)],
            ErrorKind::Encoding(msg) => vec![Self::new("ENCODING_ERROR", msg.clone(), None)],
            _ => vec![Self::new("ERROR", err.to_string(), None)],
        }
    }
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status_code, self.message)?;
        if let Some(id) = &self.record_id {
            write!(f, " {}", id)?;
        }
        Ok(())
    }
}

/// An ordered, non-empty collection of failures.
///
/// Renders one failure per line in the order they were observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateError {
    failures: Vec<RecordFailure>,
}

impl AggregateError {
    pub fn failures(&self) -> &[RecordFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Every rendered failure, in order.
    pub fn messages(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    pub fn into_failures(self) -> Vec<RecordFailure> {
        self.failures
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {}

/// Collects failures across batches and sub-responses.
#[derive(Debug, Default)]
pub struct ErrorAggregator {
    failures: Vec<RecordFailure>,
}

impl Extend<RecordFailure> for ErrorAggregator {
    fn extend<I: IntoIterator<Item = RecordFailure>>(&mut self, iter: I) {
        self.failures.extend(iter);
    }
}

impl ErrorAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, failure: RecordFailure) {
        self.failures.push(failure);
    }

    /// Record a batch-level error.
    pub fn push_error(&mut self, err: &Error) {
        self.failures.extend(RecordFailure::from_error(err));
    }

    /// Record every failed entry of a per-record result list.
    ///
    /// `record_ids` supplies the identifier of the submitted record at the
    /// same position, used when the service does not echo one back.
    /// Returns the number of failures added.
    pub fn push_results(
        &mut self,
        results: &[CollectionResult],
        record_ids: &[Option<String>],
    ) -> usize {
        let before = self.failures.len();
        for (i, result) in results.iter().enumerate() {
            if result.success {
                continue;
            }
            let record_id = result
                .id
                .clone()
                .or_else(|| record_ids.get(i).cloned().flatten());

            if result.errors.is_empty() {
                self.failures.push(RecordFailure::new(
                    "UNKNOWN_ERROR",
                    "record failed without error detail",
                    record_id,
                ));
                continue;
            }
            for error in &result.errors {
                self.failures.push(RecordFailure::new(
                    error.status_code.clone(),
                    error.message.clone(),
                    record_id.clone(),
                ));
            }
        }
        self.failures.len() - before
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    /// The combined error, or `None` when nothing failed.
    pub fn finish(self) -> Option<AggregateError> {
        if self.failures.is_empty() {
            None
        } else {
            Some(AggregateError {
                failures: self.failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::SalesforceError;

    fn failed(id: Option<&str>, errors: &[(&str, &str)]) -> CollectionResult {
        CollectionResult {
            id: id.map(String::from),
            success: false,
            errors: errors
                .iter()
                .map(|(code, msg)| SalesforceError {
                    status_code: code.to_string(),
                    message: msg.to_string(),
                    fields: vec![],
                })
                .collect(),
            created: None,
        }
    }

    fn ok(id: &str) -> CollectionResult {
        CollectionResult::succeeded(Some(id.to_string()), None)
    }

    #[test]
    fn test_no_failures_yields_none() {
        let mut agg = ErrorAggregator::new();
        assert_eq!(agg.push_results(&[ok("001A"), ok("001B")], &[]), 0);
        assert!(agg.finish().is_none());
    }

    #[test]
    fn test_render_format() {
        let failure = RecordFailure::new("DUPLICATE_VALUE", "duplicate value found", Some("001A".into()));
        assert_eq!(failure.to_string(), "DUPLICATE_VALUE: duplicate value found 001A");

        let failure = RecordFailure::new("500", "server error", None);
        assert_eq!(failure.to_string(), "500: server error");
    }

    #[test]
    fn test_every_message_is_kept_in_order() {
        let mut agg = ErrorAggregator::new();
        agg.push_results(
            &[
                ok("001A"),
                failed(Some("001B"), &[("FIELD_INTEGRITY_EXCEPTION", "bad lookup")]),
                failed(None, &[("REQUIRED_FIELD_MISSING", "Name missing"), ("INVALID_FIELD", "bad field")]),
            ],
            &[None, None, Some("001C".into())],
        );
        agg.push_error(&Error::new(ErrorKind::Transport("connection reset".into())));
        agg.push_results(&[failed(None, &[("DUPLICATE_VALUE", "dup")])], &[]);

        let err = agg.finish().unwrap();
        assert_eq!(
            err.messages(),
            vec![
                "FIELD_INTEGRITY_EXCEPTION: bad lookup 001B",
                "REQUIRED_FIELD_MISSING: Name missing 001C",
                "INVALID_FIELD: bad field 001C",
                "TRANSPORT_ERROR: connection reset",
                "DUPLICATE_VALUE: dup",
            ]
        );

        let rendered = err.to_string();
        for message in err.messages() {
            assert_eq!(rendered.matches(message.as_str()).count(), 1, "{message}");
        }
    }

    #[test]
    fn test_failure_without_detail_is_not_dropped() {
        let mut agg = ErrorAggregator::new();
        assert_eq!(agg.push_results(&[failed(Some("001A"), &[])], &[]), 1);
        let err = agg.finish().unwrap();
        assert!(err.to_string().contains("UNKNOWN_ERROR"));
    }

    #[test]
    fn test_nested_aggregate_is_flattened() {
        let mut inner = ErrorAggregator::new();
        inner.push(RecordFailure::new("A", "first", None));
        inner.push(RecordFailure::new("B", "second", None));
        let nested: Error = inner.finish().unwrap().into();

        let mut outer = ErrorAggregator::new();
        outer.push_error(&nested);
        assert_eq!(outer.len(), 2);
    }

    #[test]
    fn test_api_error_uses_code_or_status() {
        let err = Error::new(ErrorKind::Api {
            status: Some(400),
            error_code: Some("INVALID_FIELD".into()),
            message: "nope".into(),
        });
        assert_eq!(RecordFailure::from_error(&err)[0].status_code, "INVALID_FIELD");

        let err = Error::new(ErrorKind::Api {
            status: Some(502),
            error_code: None,
            message: "bad gateway".into(),
        });
        assert_eq!(RecordFailure::from_error(&err)[0].status_code, "502");
    }
}
