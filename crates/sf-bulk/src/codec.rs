//! Record encoding for job data uploads.

use std::collections::HashMap;

use csv::{Terminator, WriterBuilder};
use serde_json::Value;
use sf_dataload_dml::{Record, ATTRIBUTES_FIELD};

use crate::error::{Error, ErrorKind, Result};
use crate::types::{ColumnDelimiter, LineEnding};

/// Turns records into the payload uploaded to an ingest job.
pub trait RecordCodec: Send + Sync {
    fn encode(&self, records: &[Record]) -> Result<String>;

    /// `Content-Type` of the encoded payload.
    fn content_type(&self) -> &str;
}

/// CSV encoding as Bulk API 2.0 reads it.
///
/// The header is every field seen across all records, in first-seen order.
/// `attributes` is never written. Nested objects become dotted relationship
/// columns such as `Account.External_Id__c`, null becomes an empty cell, and
/// arrays cannot be encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvRecordCodec {
    delimiter: ColumnDelimiter,
    line_ending: LineEnding,
}

impl CsvRecordCodec {
    pub fn new(delimiter: ColumnDelimiter, line_ending: LineEnding) -> Self {
        Self {
            delimiter,
            line_ending,
        }
    }
}

impl RecordCodec for CsvRecordCodec {
    fn encode(&self, records: &[Record]) -> Result<String> {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut rows: Vec<HashMap<String, String>> = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let mut cells = Vec::new();
            flatten(None, record, &mut cells).map_err(|field| {
                Error::new(ErrorKind::Encoding(format!(
                    "record at index {} has an array in field {}",
                    index, field
                )))
            })?;

            let mut row = HashMap::with_capacity(cells.len());
            for (column, value) in cells {
                if !seen.contains_key(&column) {
                    seen.insert(column.clone(), columns.len());
                    columns.push(column.clone());
                }
                row.insert(column, value);
            }
            rows.push(row);
        }

        let terminator = match self.line_ending {
            LineEnding::Lf => Terminator::Any(b'\n'),
            LineEnding::Crlf => Terminator::CRLF,
        };
        let mut writer = WriterBuilder::new()
            .delimiter(self.delimiter.byte())
            .terminator(terminator)
            .from_writer(Vec::new());

        writer.write_record(&columns)?;
        for row in &rows {
            writer.write_record(
                columns
                    .iter()
                    .map(|column| row.get(column).map(String::as_str).unwrap_or("")),
            )?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| Error::new(ErrorKind::Encoding(e.to_string())))?;
        String::from_utf8(bytes).map_err(|e| Error::with_source(ErrorKind::Encoding(e.to_string()), e))
    }

    fn content_type(&self) -> &str {
        "text/csv"
    }
}

/// Append `(column, cell)` pairs for `record`. Returns the offending column
/// name if a value cannot be put in a cell.
fn flatten(
    prefix: Option<&str>,
    record: &Record,
    out: &mut Vec<(String, String)>,
) -> std::result::Result<(), String> {
    for (field, value) in record {
        if field == ATTRIBUTES_FIELD {
            continue;
        }
        let column = match prefix {
            Some(prefix) => format!("{}.{}", prefix, field),
            None => field.clone(),
        };
        match value {
            Value::Null => out.push((column, String::new())),
            Value::Bool(b) => out.push((column, b.to_string())),
            Value::Number(n) => out.push((column, n.to_string())),
            Value::String(s) => out.push((column, s.clone())),
            Value::Object(nested) => flatten(Some(&column), nested, out)?,
            Value::Array(_) => return Err(column),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sf_dataload_dml::RecordAdapter;

    fn records(values: Vec<Value>) -> Vec<Record> {
        values.into_iter().map(|v| v.to_record().unwrap()).collect()
    }

    #[test]
    fn test_header_is_union_in_first_seen_order() {
        let input = records(vec![
            json!({"attributes": {"type": "Account"}, "Name": "Acme", "Industry": null}),
            json!({"Name": "Globex, Inc", "Account": {"attributes": {"type": "Account"}, "External_Id__c": "E1"}}),
            json!({"NumberOfEmployees": 12, "Active__c": true}),
        ]);

        let csv = CsvRecordCodec::default().encode(&input).unwrap();
        assert_eq!(
            csv,
            "Name,Industry,Account.External_Id__c,NumberOfEmployees,Active__c\n\
             Acme,,,,\n\
             \"Globex, Inc\",,E1,,\n\
             ,,,12,true\n"
        );
    }

    #[test]
    fn test_delimiter_and_line_ending() {
        let input = records(vec![json!({"Id": "001A", "Name": "Acme"})]);
        let csv = CsvRecordCodec::new(ColumnDelimiter::Tab, LineEnding::Crlf)
            .encode(&input)
            .unwrap();
        assert_eq!(csv, "Id\tName\r\n001A\tAcme\r\n");
    }

    #[test]
    fn test_array_field_is_an_encoding_error() {
        let input = records(vec![
            json!({"Name": "Acme"}),
            json!({"Name": "Globex", "Tags__c": ["a", "b"]}),
        ]);
        let err = CsvRecordCodec::default().encode(&input).unwrap_err();
        match err.kind {
            ErrorKind::Encoding(msg) => {
                assert!(msg.contains("index 1"));
                assert!(msg.contains("Tags__c"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_content_type() {
        assert_eq!(CsvRecordCodec::default().content_type(), "text/csv");
    }
}
