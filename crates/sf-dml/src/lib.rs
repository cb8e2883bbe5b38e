//! # sf-dataload-dml
//!
//! Insert, update, upsert and delete for Salesforce records, one at a time,
//! in sObject Collections batches, or as a single Composite transaction.
//!
//! ## Features
//!
//! - **Record adaptation**: any `Serialize` value that serializes to a JSON
//!   object becomes a [`Record`]; anything else is a validation error
//! - **Batching**: [`RecordBatcher`] splits input into order-preserving
//!   batches of at most 200 records
//! - **Composite**: [`CompositeRequestBuilder`] packs batches into at most
//!   25 subrequests, checked before anything is sent
//! - **Error aggregation**: per-record failures from every batch are merged
//!   into one [`AggregateError`] that keeps every message
//!
//! ## Example
//!
//! ```rust,ignore
//! use sf_dataload_client::SalesforceClient;
//! use sf_dataload_dml::{DmlExecutor, DmlOptions};
//! use serde_json::json;
//!
//! let client = SalesforceClient::new("https://na1.salesforce.com", token)?;
//! let dml = DmlExecutor::new(client);
//!
//! let id = dml.insert_one("Account", &json!({"Name": "Acme"})).await?;
//!
//! let contacts: Vec<Contact> = load_contacts();
//! let results = dml
//!     .upsert_collection("Contact", "External_Id__c", &contacts, &DmlOptions::default())
//!     .await?;
//! ```

mod aggregate;
mod batch;
mod collections;
mod composite;
mod error;
mod executor;
mod options;
mod record;

pub use aggregate::{AggregateError, ErrorAggregator, RecordFailure};
pub use batch::{RecordBatcher, MAX_COLLECTION_BATCH_SIZE};
pub use collections::{
    CollectionRequest, CollectionResult, CreateResult, SalesforceError, UpsertResult,
};
pub use composite::{
    BatchPayload, CompositeRequest, CompositeRequestBuilder, CompositeResponse,
    CompositeSubrequest, CompositeSubresponse, MAX_SUBREQUESTS,
};
pub use error::{Error, ErrorKind, Result};
pub use executor::{DmlExecutor, DmlOperation, ExecutionMode};
pub use options::DmlOptions;
pub use record::{adapt_all, identifier, Record, RecordAdapter, ATTRIBUTES_FIELD, ID_FIELD};
