//! Canonical record representation and the adapter that produces it.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Field name of the Salesforce record id.
pub const ID_FIELD: &str = "Id";

/// Key carrying the sObject type descriptor.
pub const ATTRIBUTES_FIELD: &str = "attributes";

/// An ordered mapping from field name to value.
pub type Record = Map<String, Value>;

/// Converts a caller value into a [`Record`].
///
/// Implemented for every `Serialize` type whose serialized form is a JSON
/// object. Anything else (strings, arrays, numbers) is rejected with a
/// validation error rather than coerced.
pub trait RecordAdapter {
    fn to_record(&self) -> Result<Record>;
}

impl<T: Serialize + ?Sized> RecordAdapter for T {
    fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::validation(format!(
                "record must serialize to a field mapping, got {}",
                json_kind(&other)
            ))),
        }
    }
}

/// Adapt every record, reporting the index of the first one that fails.
pub fn adapt_all<R: RecordAdapter>(records: &[R]) -> Result<Vec<Record>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record.to_record().map_err(|err| match err.kind {
                crate::ErrorKind::Validation(msg) => {
                    Error::validation(format!("record at index {}: {}", index, msg))
                }
                _ => err,
            })
        })
        .collect()
}

/// Read an identifying value from a record.
///
/// Missing keys, `null` and empty strings all count as absent. Numbers and
/// booleans are rendered as text so they can be placed in a URL.
pub fn identifier(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
