//! DML against the single-record, sObject Collections and Composite endpoints.

use std::fmt;

use serde_json::json;
use sf_dataload_client::{HttpRequest, HttpResponse, RequestMethod, SalesforceClient, Session};
use tracing::{debug, instrument, warn};

use crate::aggregate::ErrorAggregator;
use crate::batch::RecordBatcher;
use crate::collections::{CollectionRequest, CollectionResult, CreateResult, UpsertResult};
use crate::composite::{
    batch_ids, BatchPayload, CompositeRequestBuilder, CompositeResponse, MAX_SUBREQUESTS,
};
use crate::error::{Error, ErrorKind, Result};
use crate::options::DmlOptions;
use crate::record::{adapt_all, identifier, Record, RecordAdapter, ATTRIBUTES_FIELD, ID_FIELD};

/// The DML verb to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmlOperation {
    Insert,
    Update,
    /// Create-or-update matched on a caller-named external id field.
    Upsert {
        external_id_field: String,
    },
    Delete,
}

impl DmlOperation {
    pub fn upsert(external_id_field: impl Into<String>) -> Self {
        DmlOperation::Upsert {
            external_id_field: external_id_field.into(),
        }
    }

    /// Field every record must carry a non-empty value for.
    pub fn identifier_field(&self) -> Option<&str> {
        match self {
            DmlOperation::Insert => None,
            DmlOperation::Update | DmlOperation::Delete => Some(ID_FIELD),
            DmlOperation::Upsert { external_id_field } => Some(external_id_field),
        }
    }
}

impl fmt::Display for DmlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmlOperation::Insert => f.write_str("insert"),
            DmlOperation::Update => f.write_str("update"),
            DmlOperation::Upsert { external_id_field } => write!(f, "upsert({})", external_id_field),
            DmlOperation::Delete => f.write_str("delete"),
        }
    }
}

/// How records reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One HTTP call per record; the first failure stops the run.
    Single,
    /// sObject Collections, one call per batch.
    Collection,
    /// Every batch as one subrequest of a single composite call.
    Composite,
}

/// Executes DML operations for one Salesforce org.
///
/// All input is validated before any request is sent: records must adapt
/// to field mappings, identifying fields must be present and non-empty,
/// batch sizes must fit the collection limit, and composite calls must fit
/// in [`MAX_SUBREQUESTS`] subrequests.
///
/// Batch failure handling differs by path. Collection insert, update and
/// upsert attempt every batch and return one [`AggregateError`](crate::AggregateError)
/// covering all failures. Collection delete and every composite call stop
/// at the first failing batch and return its error.
#[derive(Debug, Clone)]
pub struct DmlExecutor {
    client: SalesforceClient,
}

impl DmlExecutor {
    pub fn new(client: SalesforceClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SalesforceClient {
        &self.client
    }

    /// Run `operation` over `records` in the given mode.
    ///
    /// Returns one result per record, in input order, when nothing failed.
    /// Empty input returns an empty list without contacting the service.
    #[instrument(
        skip_all,
        fields(sobject = %sobject, operation = %operation, mode = ?mode, records = records.len())
    )]
    pub async fn execute<R: RecordAdapter>(
        &self,
        sobject: &str,
        operation: &DmlOperation,
        mode: ExecutionMode,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        let records = validate(sobject, operation, mode, records, options)?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.client.session().await?;
        match mode {
            ExecutionMode::Single => {
                self.execute_single(&session, sobject, operation, &records)
                    .await
            }
            ExecutionMode::Collection => {
                self.execute_collection(&session, sobject, operation, &records, options)
                    .await
            }
            ExecutionMode::Composite => {
                self.execute_composite(&session, sobject, operation, &records, options)
                    .await
            }
        }
    }

    // =========================================================================
    // Single record
    // =========================================================================

    /// Create one record and return its id.
    pub async fn insert_one<R: RecordAdapter>(&self, sobject: &str, record: &R) -> Result<String> {
        let results = self
            .execute(
                sobject,
                &DmlOperation::Insert,
                ExecutionMode::Single,
                std::slice::from_ref(record),
                &DmlOptions::default(),
            )
            .await?;

        results
            .into_iter()
            .next()
            .and_then(|r| r.id)
            .ok_or_else(|| Error::new(ErrorKind::Encoding("create response has no id".into())))
    }

    /// Update one record identified by its `Id` field.
    pub async fn update_one<R: RecordAdapter>(&self, sobject: &str, record: &R) -> Result<()> {
        self.execute(
            sobject,
            &DmlOperation::Update,
            ExecutionMode::Single,
            std::slice::from_ref(record),
            &DmlOptions::default(),
        )
        .await
        .map(|_| ())
    }

    /// Upsert one record matched on `external_id_field`.
    pub async fn upsert_one<R: RecordAdapter>(
        &self,
        sobject: &str,
        external_id_field: &str,
        record: &R,
    ) -> Result<UpsertResult> {
        let results = self
            .execute(
                sobject,
                &DmlOperation::upsert(external_id_field),
                ExecutionMode::Single,
                std::slice::from_ref(record),
                &DmlOptions::default(),
            )
            .await?;

        let result = results.into_iter().next().ok_or_else(|| {
            Error::new(ErrorKind::Encoding("upsert returned no result".into()))
        })?;
        Ok(UpsertResult {
            id: result.id.unwrap_or_default(),
            success: result.success,
            created: result.created.unwrap_or(false),
            errors: result.errors,
        })
    }

    /// Delete one record identified by its `Id` field.
    pub async fn delete_one<R: RecordAdapter>(&self, sobject: &str, record: &R) -> Result<()> {
        self.execute(
            sobject,
            &DmlOperation::Delete,
            ExecutionMode::Single,
            std::slice::from_ref(record),
            &DmlOptions::default(),
        )
        .await
        .map(|_| ())
    }

    // =========================================================================
    // sObject Collections
    // =========================================================================

    pub async fn insert_collection<R: RecordAdapter>(
        &self,
        sobject: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(sobject, &DmlOperation::Insert, ExecutionMode::Collection, records, options)
            .await
    }

    pub async fn update_collection<R: RecordAdapter>(
        &self,
        sobject: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(sobject, &DmlOperation::Update, ExecutionMode::Collection, records, options)
            .await
    }

    pub async fn upsert_collection<R: RecordAdapter>(
        &self,
        sobject: &str,
        external_id_field: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(
            sobject,
            &DmlOperation::upsert(external_id_field),
            ExecutionMode::Collection,
            records,
            options,
        )
        .await
    }

    pub async fn delete_collection<R: RecordAdapter>(
        &self,
        sobject: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(sobject, &DmlOperation::Delete, ExecutionMode::Collection, records, options)
            .await
    }

    // =========================================================================
    // Composite
    // =========================================================================

    pub async fn insert_composite<R: RecordAdapter>(
        &self,
        sobject: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(sobject, &DmlOperation::Insert, ExecutionMode::Composite, records, options)
            .await
    }

    pub async fn update_composite<R: RecordAdapter>(
        &self,
        sobject: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(sobject, &DmlOperation::Update, ExecutionMode::Composite, records, options)
            .await
    }

    pub async fn upsert_composite<R: RecordAdapter>(
        &self,
        sobject: &str,
        external_id_field: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(
            sobject,
            &DmlOperation::upsert(external_id_field),
            ExecutionMode::Composite,
            records,
            options,
        )
        .await
    }

    pub async fn delete_composite<R: RecordAdapter>(
        &self,
        sobject: &str,
        records: &[R],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        self.execute(sobject, &DmlOperation::Delete, ExecutionMode::Composite, records, options)
            .await
    }

    // =========================================================================
    // Paths
    // =========================================================================

    async fn execute_single(
        &self,
        session: &Session,
        sobject: &str,
        operation: &DmlOperation,
        records: &[Record],
    ) -> Result<Vec<CollectionResult>> {
        let mut results = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            debug!(index, "Submitting record");
            results.push(self.send_single(session, sobject, operation, record).await?);
        }
        Ok(results)
    }

    async fn send_single(
        &self,
        session: &Session,
        sobject: &str,
        operation: &DmlOperation,
        record: &Record,
    ) -> Result<CollectionResult> {
        let sobject_path = format!("sobjects/{}", urlencoding::encode(sobject));
        let body = shape(sobject, operation, ExecutionMode::Single, record);

        match operation {
            DmlOperation::Insert => {
                let request = session.post(session.rest_url(&sobject_path)).json(&body)?;
                let created: CreateResult = self.send_expecting(request, 201).await?.json()?;
                Ok(CollectionResult::succeeded(Some(created.id), Some(true)))
            }
            DmlOperation::Update => {
                let id = required(record, ID_FIELD)?;
                let url = session.rest_url(&format!(
                    "{}/{}",
                    sobject_path,
                    urlencoding::encode(&id)
                ));
                self.send_expecting(session.patch(url).json(&body)?, 204)
                    .await?;
                Ok(CollectionResult::succeeded(Some(id), None))
            }
            DmlOperation::Upsert { external_id_field } => {
                let value = required(record, external_id_field)?;
                let url = session.rest_url(&format!(
                    "{}/{}/{}",
                    sobject_path,
                    urlencoding::encode(external_id_field),
                    urlencoding::encode(&value)
                ));
                let response = self
                    .send_expecting(session.patch(url).json(&body)?, 200)
                    .await?;

                if response.body().trim().is_empty() {
                    return Ok(CollectionResult::succeeded(
                        identifier(record, ID_FIELD),
                        Some(false),
                    ));
                }

                let upserted: UpsertResult = response.json()?;
                let result = CollectionResult {
                    id: Some(upserted.id),
                    success: upserted.success,
                    errors: upserted.errors,
                    created: Some(upserted.created),
                };
                let mut errors = ErrorAggregator::new();
                errors.push_results(std::slice::from_ref(&result), &[Some(value)]);
                match errors.finish() {
                    Some(agg) => Err(agg.into()),
                    None => Ok(result),
                }
            }
            DmlOperation::Delete => {
                let id = required(record, ID_FIELD)?;
                let url = session.rest_url(&format!(
                    "{}/{}",
                    sobject_path,
                    urlencoding::encode(&id)
                ));
                self.send_expecting(session.delete(url), 204).await?;
                Ok(CollectionResult::succeeded(Some(id), None))
            }
        }
    }

    async fn execute_collection(
        &self,
        session: &Session,
        sobject: &str,
        operation: &DmlOperation,
        records: &[Record],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        let batcher = RecordBatcher::new(options.batch_size)?;
        // Delete stops at the first failing batch; the other verbs keep going.
        let continue_on_failure = !matches!(operation, DmlOperation::Delete);

        let mut aggregator = ErrorAggregator::new();
        let mut results = Vec::with_capacity(records.len());

        for (index, batch) in batcher.batches(records).enumerate() {
            let offset = index * batcher.batch_size();
            debug!(batch = index, size = batch.len(), "Submitting collection batch");

            match self
                .send_collection_batch(session, sobject, operation, batch, offset, options)
                .await
            {
                Ok(batch_results) => {
                    let mut batch_errors = ErrorAggregator::new();
                    batch_errors.push_results(&batch_results, &record_ids(operation, batch));
                    results.extend(batch_results);

                    if let Some(agg) = batch_errors.finish() {
                        warn!(batch = index, failed = agg.len(), "Collection batch reported record failures");
                        if !continue_on_failure {
                            return Err(agg.into());
                        }
                        aggregator.extend(agg.into_failures());
                    }
                }
                Err(err) => {
                    warn!(batch = index, error = %err, "Collection batch failed");
                    if !continue_on_failure {
                        return Err(err);
                    }
                    aggregator.push_error(&err);
                }
            }
        }

        match aggregator.finish() {
            Some(agg) => Err(agg.into()),
            None => Ok(results),
        }
    }

    async fn send_collection_batch(
        &self,
        session: &Session,
        sobject: &str,
        operation: &DmlOperation,
        batch: &[Record],
        offset: usize,
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        let collection_url = session.rest_url("composite/sobjects");
        let payload = || CollectionRequest {
            all_or_none: options.all_or_none,
            records: batch
                .iter()
                .map(|r| shape(sobject, operation, ExecutionMode::Collection, r))
                .collect(),
        };

        let request = match operation {
            DmlOperation::Insert => session.post(collection_url).json(&payload())?,
            DmlOperation::Update => session.patch(collection_url).json(&payload())?,
            DmlOperation::Upsert { external_id_field } => session
                .patch(format!(
                    "{}/{}/{}",
                    collection_url,
                    urlencoding::encode(sobject),
                    urlencoding::encode(external_id_field)
                ))
                .json(&payload())?,
            DmlOperation::Delete => {
                let ids = batch_ids(batch, offset)?;
                session.delete(format!(
                    "{}?ids={}&allOrNone={}",
                    collection_url,
                    ids.join(","),
                    options.all_or_none
                ))
            }
        };

        Ok(self.send_expecting(request, 200).await?.json()?)
    }

    async fn execute_composite(
        &self,
        session: &Session,
        sobject: &str,
        operation: &DmlOperation,
        records: &[Record],
        options: &DmlOptions,
    ) -> Result<Vec<CollectionResult>> {
        let base = format!("{}/composite/sobjects", session.data_path());
        let builder = match operation {
            DmlOperation::Insert => CompositeRequestBuilder::new(RequestMethod::Post, base),
            DmlOperation::Update => CompositeRequestBuilder::new(RequestMethod::Patch, base),
            DmlOperation::Upsert { external_id_field } => CompositeRequestBuilder::new(
                RequestMethod::Patch,
                format!(
                    "{}/{}/{}",
                    base,
                    urlencoding::encode(sobject),
                    urlencoding::encode(external_id_field)
                ),
            ),
            DmlOperation::Delete => CompositeRequestBuilder::new(RequestMethod::Delete, base)
                .payload(BatchPayload::IdList),
        }
        .all_or_none(options.all_or_none)
        .batch_size(options.batch_size);

        let payload: Vec<Record> = match operation {
            DmlOperation::Delete => records.to_vec(),
            _ => records
                .iter()
                .map(|r| shape(sobject, operation, ExecutionMode::Composite, r))
                .collect(),
        };
        let composite = builder.build(&payload)?;
        debug!(subrequests = composite.subrequests.len(), "Submitting composite request");

        let request = session.post(session.rest_url("composite")).json(&composite)?;
        let response: CompositeResponse = self.send_expecting(request, 200).await?.json()?;

        let ids = record_ids(operation, records);
        let mut results = Vec::with_capacity(records.len());
        for (index, sub) in response.responses.iter().enumerate() {
            if !sub.is_success() {
                warn!(
                    reference_id = %sub.reference_id,
                    status = sub.http_status_code,
                    "Composite sub-request failed"
                );
                let err = HttpResponse::new(sub.http_status_code, sub.body.to_string()).into_error();
                return Err(err.into());
            }

            let sub_results = sub.results()?;
            let offset = index * options.batch_size;
            let mut errors = ErrorAggregator::new();
            errors.push_results(&sub_results, ids.get(offset..).unwrap_or(&[]));
            if let Some(agg) = errors.finish() {
                warn!(
                    reference_id = %sub.reference_id,
                    failed = agg.len(),
                    "Composite sub-request reported record failures"
                );
                return Err(agg.into());
            }
            results.extend(sub_results);
        }

        Ok(results)
    }

    async fn send_expecting(&self, request: HttpRequest, expected: u16) -> Result<HttpResponse> {
        let response = self.client.send(request).await?;
        Ok(response.expect_status(expected)?)
    }
}

/// Pre-flight checks shared by every mode. No I/O happens here.
fn validate<R: RecordAdapter>(
    sobject: &str,
    operation: &DmlOperation,
    mode: ExecutionMode,
    records: &[R],
    options: &DmlOptions,
) -> Result<Vec<Record>> {
    if sobject.trim().is_empty() {
        return Err(Error::validation("sObject name must not be empty"));
    }
    if let DmlOperation::Upsert { external_id_field } = operation {
        if external_id_field.trim().is_empty() {
            return Err(Error::validation("external id field name must not be empty"));
        }
    }
    if mode != ExecutionMode::Single {
        options.validate()?;
    }

    let records = adapt_all(records)?;

    if let Some(field) = operation.identifier_field() {
        if let Some(index) = records.iter().position(|r| identifier(r, field).is_none()) {
            return Err(Error::new(ErrorKind::MissingIdentifier {
                sobject: sobject.to_string(),
                field: field.to_string(),
                index,
            }));
        }
    }

    if mode == ExecutionMode::Composite {
        let batches = RecordBatcher::new(options.batch_size)?.batch_count(records.len());
        if batches > MAX_SUBREQUESTS {
            return Err(Error::new(ErrorKind::SubrequestLimit {
                batches,
                max: MAX_SUBREQUESTS,
            }));
        }
    }

    Ok(records)
}

/// Build the wire form of a record: `attributes.type` first, then every
/// field except the identifiers the endpoint takes elsewhere.
///
/// Insert never sends `Id`. Single update and upsert carry their key in
/// the URL, so it is dropped from the body. Collection update keeps `Id`
/// and collection upsert keeps the external id field because those
/// endpoints match on them.
fn shape(sobject: &str, operation: &DmlOperation, mode: ExecutionMode, record: &Record) -> Record {
    let strip_id = !matches!(
        (operation, mode),
        (DmlOperation::Update, ExecutionMode::Collection | ExecutionMode::Composite)
    );
    let strip_external = match (operation, mode) {
        (DmlOperation::Upsert { external_id_field }, ExecutionMode::Single) => {
            Some(external_id_field.as_str())
        }
        _ => None,
    };

    let mut shaped = Record::new();
    shaped.insert(ATTRIBUTES_FIELD.to_string(), json!({ "type": sobject }));
    for (field, value) in record {
        if field == ATTRIBUTES_FIELD
            || (strip_id && field == ID_FIELD)
            || Some(field.as_str()) == strip_external
        {
            continue;
        }
        shaped.insert(field.clone(), value.clone());
    }
    shaped
}

/// Identifier of each submitted record, used when a failed result does
/// not echo one back.
fn record_ids(operation: &DmlOperation, records: &[Record]) -> Vec<Option<String>> {
    records
        .iter()
        .map(|r| {
            operation
                .identifier_field()
                .and_then(|field| identifier(r, field))
        })
        .collect()
}

fn required(record: &Record, field: &str) -> Result<String> {
    identifier(record, field)
        .ok_or_else(|| Error::validation(format!("record is missing required field {}", field)))
}
