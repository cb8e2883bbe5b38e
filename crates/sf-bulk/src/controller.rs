//! Bulk API 2.0 ingest job controller.
//!
//! Drives one ingest job from creation to a terminal state: create it,
//! upload the encoded records, mark the upload complete, then poll until
//! the server finishes and interpret the outcome.

use std::sync::Arc;

use sf_dataload_client::{HttpRequest, HttpResponse, SalesforceClient, Session};
use sf_dataload_dml::{adapt_all, identifier, Record, RecordAdapter, RecordBatcher, ID_FIELD};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::codec::{CsvRecordCodec, RecordCodec};
use crate::error::{Error, ErrorKind, Result};
use crate::options::BulkOptions;
use crate::poll::{poll_until, PollConfig};
use crate::types::{
    BulkOperation, CreateIngestJobRequest, IngestJob, IngestJobResult, JobState,
    UpdateJobStateRequest,
};

/// Runs ingest jobs for one Salesforce org.
///
/// # Example
///
/// ```rust,ignore
/// use sf_dataload_bulk::{BulkJobController, BulkOperation, BulkOptions};
///
/// let bulk = BulkJobController::new(client);
/// let job_id = bulk
///     .execute("Account", BulkOperation::Insert, &accounts, &BulkOptions::default())
///     .await?;
/// ```
#[derive(Clone)]
pub struct BulkJobController {
    client: SalesforceClient,
    poll: PollConfig,
    codec: Option<Arc<dyn RecordCodec>>,
}

impl std::fmt::Debug for BulkJobController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkJobController")
            .field("client", &self.client)
            .field("poll", &self.poll)
            .field("custom_codec", &self.codec.is_some())
            .finish()
    }
}

impl BulkJobController {
    pub fn new(client: SalesforceClient) -> Self {
        Self {
            client,
            poll: PollConfig::default(),
            codec: None,
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Encode uploads with `codec` instead of CSV built from the call's
    /// delimiter and line ending options.
    pub fn with_codec(mut self, codec: impl RecordCodec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    pub fn client(&self) -> &SalesforceClient {
        &self.client
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    // =========================================================================
    // End-to-end ingest
    // =========================================================================

    /// Ingest `records` through one job and return its id.
    ///
    /// With `wait_for_results` set, the job is polled to a terminal state and
    /// any failure it reports is returned as an error. Every error raised
    /// after the job was created carries its id.
    pub async fn execute<R: RecordAdapter>(
        &self,
        sobject: &str,
        operation: BulkOperation,
        records: &[R],
        options: &BulkOptions,
    ) -> Result<String> {
        self.execute_with_cancellation(
            sobject,
            operation,
            records,
            options,
            &CancellationToken::new(),
        )
        .await
    }

    /// [`execute`](Self::execute), with polling stopped when `token` is cancelled.
    #[instrument(
        skip_all,
        fields(sobject = %sobject, operation = %operation, records = records.len())
    )]
    pub async fn execute_with_cancellation<R: RecordAdapter>(
        &self,
        sobject: &str,
        operation: BulkOperation,
        records: &[R],
        options: &BulkOptions,
        token: &CancellationToken,
    ) -> Result<String> {
        let records = validate(sobject, operation, records, options)?;
        let session = self.client.session().await?;
        self.run_job(&session, sobject, operation, &records, options, token)
            .await
    }

    /// Split `records` into jobs of `options.batch_size` records and run them
    /// one after another.
    ///
    /// Returns every job id in submission order. The first job that fails
    /// stops the run; its error carries that job's id.
    #[instrument(
        skip_all,
        fields(sobject = %sobject, operation = %operation, records = records.len())
    )]
    pub async fn execute_batched<R: RecordAdapter>(
        &self,
        sobject: &str,
        operation: BulkOperation,
        records: &[R],
        options: &BulkOptions,
    ) -> Result<Vec<String>> {
        let records = validate(sobject, operation, records, options)?;
        let batcher = RecordBatcher::new(options.batch_size)?;
        let session = self.client.session().await?;
        let token = CancellationToken::new();

        let mut job_ids = Vec::with_capacity(batcher.batch_count(records.len()));
        for (index, batch) in batcher.batches(&records).enumerate() {
            info!(batch = index, size = batch.len(), "Starting ingest job for batch");
            job_ids.push(
                self.run_job(&session, sobject, operation, batch, options, &token)
                    .await?,
            );
        }
        Ok(job_ids)
    }

    async fn run_job(
        &self,
        session: &Session,
        sobject: &str,
        operation: BulkOperation,
        records: &[Record],
        options: &BulkOptions,
        token: &CancellationToken,
    ) -> Result<String> {
        let mut request = CreateIngestJobRequest::new(sobject, operation)
            .with_column_delimiter(options.column_delimiter)
            .with_line_ending(options.line_ending);
        if operation == BulkOperation::Upsert {
            if let Some(field) = &options.external_id_field {
                request = request.with_external_id_field(field);
            }
        }

        let job = self.open_job(session, &request).await?;
        let job_id = job.id;

        if let Err(err) = self.upload_records(session, &job_id, records, options).await {
            if let Err(abort_err) = self
                .set_state(session, &job_id, UpdateJobStateRequest::abort())
                .await
            {
                warn!(job_id = %job_id, error = %abort_err, "Failed to abort job after upload failure");
            }
            return Err(err.with_job_id(job_id));
        }

        self.set_state(session, &job_id, UpdateJobStateRequest::upload_complete())
            .await?;
        info!(job_id = %job_id, "Closed ingest job");

        if options.wait_for_results {
            self.await_job(session, &job_id, token).await?;
        }

        Ok(job_id)
    }

    async fn upload_records(
        &self,
        session: &Session,
        job_id: &str,
        records: &[Record],
        options: &BulkOptions,
    ) -> Result<()> {
        let (data, content_type) = match &self.codec {
            Some(codec) => (codec.encode(records)?, codec.content_type().to_string()),
            None => {
                let codec = CsvRecordCodec::new(options.column_delimiter, options.line_ending);
                (codec.encode(records)?, codec.content_type().to_string())
            }
        };
        self.put_batches(session, job_id, data, &content_type).await
    }

    // =========================================================================
    // Job operations
    // =========================================================================

    /// Create an ingest job.
    ///
    /// The server must answer with a job id and the `Open` state. When it
    /// returns an id but no usable state, the error still carries the id so
    /// the job can be inspected or aborted.
    #[instrument(skip(self, request), fields(object = %request.object, operation = %request.operation))]
    pub async fn create_job(&self, request: &CreateIngestJobRequest) -> Result<IngestJob> {
        let session = self.client.session().await?;
        self.open_job(&session, request).await
    }

    /// Upload encoded data to an open job.
    #[instrument(skip(self, data, content_type), fields(bytes = data.len()))]
    pub async fn upload_data(&self, job_id: &str, data: String, content_type: &str) -> Result<()> {
        let session = self.client.session().await?;
        self.put_batches(&session, job_id, data, content_type).await
    }

    /// Mark the upload complete so the server starts processing.
    #[instrument(skip(self))]
    pub async fn close_job(&self, job_id: &str) -> Result<IngestJob> {
        let session = self.client.session().await?;
        let job = self
            .set_state(&session, job_id, UpdateJobStateRequest::upload_complete())
            .await?;
        info!(job_id = %job_id, "Closed ingest job");
        Ok(job)
    }

    #[instrument(skip(self))]
    pub async fn abort_job(&self, job_id: &str) -> Result<IngestJob> {
        let session = self.client.session().await?;
        let job = self
            .set_state(&session, job_id, UpdateJobStateRequest::abort())
            .await?;
        info!(job_id = %job_id, "Aborted ingest job");
        Ok(job)
    }

    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: &str) -> Result<IngestJob> {
        let session = self.client.session().await?;
        self.fetch_job(&session, job_id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_job(&self, job_id: &str) -> Result<()> {
        let session = self.client.session().await?;
        self.send(session.delete(job_url(&session, job_id)))
            .await
            .map_err(|e| e.with_job_id(job_id))?;
        Ok(())
    }

    /// Successful records report (CSV).
    #[instrument(skip(self))]
    pub async fn get_successful_results(&self, job_id: &str) -> Result<String> {
        let session = self.client.session().await?;
        self.get_report(&session, job_id, "successfulResults").await
    }

    /// Failed records report (CSV), one row per record with `sf__Error`.
    #[instrument(skip(self))]
    pub async fn get_failed_results(&self, job_id: &str) -> Result<String> {
        let session = self.client.session().await?;
        self.get_report(&session, job_id, "failedResults").await
    }

    /// Records the server never processed (CSV).
    #[instrument(skip(self))]
    pub async fn get_unprocessed_records(&self, job_id: &str) -> Result<String> {
        let session = self.client.session().await?;
        self.get_report(&session, job_id, "unprocessedrecords").await
    }

    /// Job info plus both result reports.
    #[instrument(skip(self))]
    pub async fn get_job_results(&self, job_id: &str) -> Result<IngestJobResult> {
        let session = self.client.session().await?;
        let job = self.fetch_job(&session, job_id).await?;
        let successful_results = self
            .get_report(&session, job_id, "successfulResults")
            .await?;
        let failed_results = self.get_report(&session, job_id, "failedResults").await?;

        Ok(IngestJobResult {
            job,
            successful_results,
            failed_results,
        })
    }

    /// Poll the job until it reaches a terminal state and interpret it.
    ///
    /// Returns the final job info when it completed with no failures.
    /// Otherwise returns, in order of precedence: the server's error
    /// message, the failed-records report, or a count of failed records
    /// when the report cannot be fetched. An aborted job, a timeout or a
    /// cancelled `token` each have their own error kind.
    #[instrument(skip(self, token))]
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        token: &CancellationToken,
    ) -> Result<IngestJob> {
        let session = self.client.session().await?;
        self.await_job(&session, job_id, token).await
    }

    async fn await_job(
        &self,
        session: &Session,
        job_id: &str,
        token: &CancellationToken,
    ) -> Result<IngestJob> {
        let job = poll_until(&self.poll, token, move || async move {
            let job = self.fetch_job(session, job_id).await?;
            Ok::<_, Error>(job.state.is_terminal().then_some(job))
        })
        .await
        .map_err(|e| e.with_job_id(job_id))?;

        info!(job_id = %job_id, state = %job.state, "Ingest job finished");
        self.resolve(session, job)
            .await
            .map_err(|e| e.with_job_id(job_id))
    }

    async fn resolve(&self, session: &Session, job: IngestJob) -> Result<IngestJob> {
        match job.state {
            JobState::Open | JobState::UploadComplete | JobState::InProgress => Ok(job),
            JobState::Aborted => Err(Error::new(ErrorKind::Aborted)),
            JobState::JobComplete | JobState::Failed => {
                if let Some(message) = job.error_message() {
                    return Err(Error::new(ErrorKind::JobFailed(message.to_string())));
                }

                let count = job.number_records_failed;
                if count > 0 {
                    return Err(match self.get_report(session, &job.id, "failedResults").await {
                        Ok(report) => Error::new(ErrorKind::FailedRecords { count, report }),
                        Err(err) => {
                            warn!(job_id = %job.id, error = %err, "Could not fetch failed records");
                            Error::with_source(ErrorKind::FailedRecordCount(count), err)
                        }
                    });
                }

                match job.state {
                    JobState::JobComplete => Ok(job),
                    _ => Err(Error::new(ErrorKind::JobFailed(
                        "bulk job failed without an error message".to_string(),
                    ))),
                }
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn open_job(
        &self,
        session: &Session,
        request: &CreateIngestJobRequest,
    ) -> Result<IngestJob> {
        let req = session.post(session.bulk_url("ingest")).json(request)?;
        let body: serde_json::Value = self.send(req).await?.json()?;

        let job_id = body
            .get("id")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::new(ErrorKind::JobClosedPrematurely(
                    "server returned no job id".to_string(),
                ))
            })?;

        let job: IngestJob = serde_json::from_value(body).map_err(|err| {
            Error::with_source(
                ErrorKind::JobClosedPrematurely(
                    "server did not report the job state".to_string(),
                ),
                err,
            )
            .with_job_id(&job_id)
        })?;
        if job.state != JobState::Open {
            return Err(Error::new(ErrorKind::JobClosedPrematurely(format!(
                "job is {} instead of Open",
                job.state
            )))
            .with_job_id(&job_id));
        }

        info!(job_id = %job.id, "Created ingest job");
        Ok(job)
    }

    async fn put_batches(
        &self,
        session: &Session,
        job_id: &str,
        data: String,
        content_type: &str,
    ) -> Result<()> {
        let url = format!("{}/batches", job_url(session, job_id));
        self.send(session.put(url).text(data, content_type))
            .await
            .map_err(|e| e.with_job_id(job_id))?;
        Ok(())
    }

    async fn fetch_job(&self, session: &Session, job_id: &str) -> Result<IngestJob> {
        let response = self
            .send(session.get(job_url(session, job_id)))
            .await
            .map_err(|e| e.with_job_id(job_id))?;
        response.json().map_err(|e| Error::from(e).with_job_id(job_id))
    }

    async fn set_state(
        &self,
        session: &Session,
        job_id: &str,
        state: UpdateJobStateRequest,
    ) -> Result<IngestJob> {
        let req = session.patch(job_url(session, job_id)).json(&state)?;
        let response = self.send(req).await.map_err(|e| e.with_job_id(job_id))?;
        response.json().map_err(|e| Error::from(e).with_job_id(job_id))
    }

    async fn get_report(&self, session: &Session, job_id: &str, report: &str) -> Result<String> {
        let url = format!("{}/{}", job_url(session, job_id), report);
        let response = self
            .send(session.get(url).header("Accept", "text/csv"))
            .await
            .map_err(|e| e.with_job_id(job_id))?;
        Ok(response.into_text())
    }

    /// Send and accept any 2xx status.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.client.send(request).await?;
        Ok(response.error_for_status()?)
    }
}

fn job_url(session: &Session, job_id: &str) -> String {
    session.bulk_url(&format!("ingest/{}", urlencoding::encode(job_id)))
}

/// Pre-flight checks. No I/O happens here.
fn validate<R: RecordAdapter>(
    sobject: &str,
    operation: BulkOperation,
    records: &[R],
    options: &BulkOptions,
) -> Result<Vec<Record>> {
    if sobject.trim().is_empty() {
        return Err(Error::validation("sObject name must not be empty"));
    }
    options.validate()?;
    if records.is_empty() {
        return Err(Error::validation("no records to ingest"));
    }

    let key = match operation {
        BulkOperation::Upsert => match options.external_id_field.as_deref() {
            Some(field) => Some(field),
            None => {
                return Err(Error::validation(
                    "upsert jobs require an external id field",
                ))
            }
        },
        BulkOperation::Update | BulkOperation::Delete | BulkOperation::HardDelete => {
            Some(ID_FIELD)
        }
        BulkOperation::Insert => None,
    };

    let records = adapt_all(records)?;
    if let Some(field) = key {
        if let Some(index) = records.iter().position(|r| identifier(r, field).is_none()) {
            return Err(Error::validation(format!(
                "{} record at index {} is missing required field {}",
                sobject, index, field
            )));
        }
    }
    Ok(records)
}
