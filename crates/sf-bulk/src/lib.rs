//! # sf-dataload-bulk
//!
//! Bulk API 2.0 ingest jobs driven from record collections.
//!
//! ## Features
//!
//! - **Ingest Jobs** - Insert, Update, Upsert, Delete, Hard Delete
//! - **Lifecycle** - create, upload, close, then poll to a terminal state
//! - **Failure detail** - the server's job error, or the failed-records report
//! - **Bounded polling** - fixed interval, overall deadline, cancellation
//! - **Job Management** - inspect, abort, delete, fetch result reports
//! - **CSV Support** - records encoded with a union header and dotted
//!   relationship columns
//!
//! ## Example - Bulk Upsert
//!
//! ```rust,ignore
//! use sf_dataload_bulk::{BulkJobController, BulkOperation, BulkOptions};
//! use sf_dataload_client::SalesforceClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sf_dataload_bulk::Error> {
//!     let client = SalesforceClient::new("https://myorg.my.salesforce.com", "access_token")?;
//!     let bulk = BulkJobController::new(client);
//!
//!     let contacts = vec![
//!         serde_json::json!({"External_Id__c": "C-1", "LastName": "Lovelace"}),
//!         serde_json::json!({"External_Id__c": "C-2", "LastName": "Hopper"}),
//!     ];
//!     let job_id = bulk
//!         .execute(
//!             "Contact",
//!             BulkOperation::Upsert,
//!             &contacts,
//!             &BulkOptions::new().with_external_id_field("External_Id__c"),
//!         )
//!         .await?;
//!
//!     println!("Job {} completed", job_id);
//!     Ok(())
//! }
//! ```

mod codec;
mod controller;
mod error;
mod options;
mod poll;
mod types;

pub use codec::{CsvRecordCodec, RecordCodec};
pub use controller::BulkJobController;
pub use error::{Error, ErrorKind, Result};
pub use options::{BulkOptions, DEFAULT_JOB_BATCH_SIZE};
pub use poll::{poll_until, PollConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
pub use types::*;

pub use tokio_util::sync::CancellationToken;
