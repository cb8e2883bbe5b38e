//! Composite API payloads and the batch-to-subrequest builder.

use serde::{Deserialize, Serialize};
use sf_dataload_client::RequestMethod;

use crate::batch::RecordBatcher;
use crate::collections::{CollectionRequest, CollectionResult};
use crate::error::{Error, ErrorKind, Result};
use crate::record::{identifier, Record, ID_FIELD};

/// Maximum number of subrequests in one composite request.
pub const MAX_SUBREQUESTS: usize = 25;

/// A composite request containing multiple subrequests.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeRequest {
    #[serde(rename = "allOrNone")]
    pub all_or_none: bool,
    #[serde(rename = "compositeRequest")]
    pub subrequests: Vec<CompositeSubrequest>,
}

/// A single subrequest within a composite request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeSubrequest {
    pub method: String,
    pub url: String,
    #[serde(rename = "referenceId")]
    pub reference_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

/// Response from a composite request.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeResponse {
    #[serde(rename = "compositeResponse")]
    pub responses: Vec<CompositeSubresponse>,
}

/// Response from a single subrequest.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeSubresponse {
    #[serde(default)]
    pub body: serde_json::Value,
    #[serde(rename = "httpHeaders", default)]
    pub http_headers: serde_json::Value,
    #[serde(rename = "httpStatusCode")]
    pub http_status_code: u16,
    #[serde(rename = "referenceId")]
    pub reference_id: String,
}

impl CompositeSubresponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status_code)
    }

    /// Decode the per-record results carried by a collection subrequest.
    pub fn results(&self) -> Result<Vec<CollectionResult>> {
        serde_json::from_value(self.body.clone()).map_err(|e| {
            Error::with_source(
                ErrorKind::Encoding(format!(
                    "sub-response {} is not a record result list: {}",
                    self.reference_id, e
                )),
                e,
            )
        })
    }
}

/// How each batch is carried by its subrequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPayload {
    /// Body `{allOrNone, records}`.
    Collection,
    /// No body; the batch's `Id` values go in an `ids` query parameter
    /// alongside `allOrNone`.
    IdList,
}

/// Packs record batches into one [`CompositeRequest`], one subrequest per
/// batch, with reference ids `refObj0`, `refObj1`, ...
#[derive(Debug, Clone)]
pub struct CompositeRequestBuilder {
    method: RequestMethod,
    url: String,
    all_or_none: bool,
    batch_size: usize,
    payload: BatchPayload,
}

impl CompositeRequestBuilder {
    /// Start a builder for subrequests sent with `method` to `url`.
    ///
    /// `url` is relative to the instance, e.g.
    /// `/services/data/v62.0/composite/sobjects`.
    pub fn new(method: RequestMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            all_or_none: false,
            batch_size: crate::MAX_COLLECTION_BATCH_SIZE,
            payload: BatchPayload::Collection,
        }
    }

    pub fn all_or_none(mut self, all_or_none: bool) -> Self {
        self.all_or_none = all_or_none;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn payload(mut self, payload: BatchPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Build the request.
    ///
    /// The subrequest ceiling is checked before any body is constructed.
    pub fn build(&self, records: &[Record]) -> Result<CompositeRequest> {
        let batcher = RecordBatcher::new(self.batch_size)?;
        let batches = batcher.batch_count(records.len());
        if batches > MAX_SUBREQUESTS {
            return Err(Error::new(ErrorKind::SubrequestLimit {
                batches,
                max: MAX_SUBREQUESTS,
            }));
        }

        let mut subrequests = Vec::with_capacity(batches);
        for (index, batch) in batcher.batches(records).enumerate() {
            let (url, body) = match self.payload {
                BatchPayload::Collection => {
                    let body = serde_json::to_value(CollectionRequest {
                        all_or_none: self.all_or_none,
                        records: batch.to_vec(),
                    })?;
                    (self.url.clone(), Some(body))
                }
                BatchPayload::IdList => {
                    let ids = batch_ids(batch, index * self.batch_size)?;
                    (
                        format!(
                            "{}?ids={}&allOrNone={}",
                            self.url,
                            ids.join(","),
                            self.all_or_none
                        ),
                        None,
                    )
                }
            };

            subrequests.push(CompositeSubrequest {
                method: self.method.as_str().to_string(),
                url,
                reference_id: format!("refObj{}", index),
                body,
            });
        }

        Ok(CompositeRequest {
            all_or_none: self.all_or_none,
            subrequests,
        })
    }
}

/// Percent-encoded `Id` values of a batch. `offset` is the index of the
/// batch's first record in the whole input.
pub(crate) fn batch_ids(batch: &[Record], offset: usize) -> Result<Vec<String>> {
    batch
        .iter()
        .enumerate()
        .map(|(i, record)| {
            identifier(record, ID_FIELD)
                .map(|id| urlencoding::encode(&id).into_owned())
                .ok_or_else(|| {
                    Error::new(ErrorKind::MissingIdentifier {
                        sobject: record_type(record).unwrap_or_default(),
                        field: ID_FIELD.to_string(),
                        index: offset + i,
                    })
                })
        })
        .collect()
}

fn record_type(record: &Record) -> Option<String> {
    record
        .get(crate::record::ATTRIBUTES_FIELD)?
        .get("type")?
        .as_str()
        .map(String::from)
}
