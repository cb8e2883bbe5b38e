//! # sf-dataload
//!
//! Batched, composite and bulk DML for the Salesforce record APIs.
//!
//! Hand it records of any serializable shape and it turns them into
//! correctly bounded network operations: single-record calls, sObject
//! Collections batches of up to 200 records, one Composite transaction of
//! up to 25 batches, or an asynchronous Bulk API 2.0 ingest job. Partial
//! failures across records and batches come back as one error that keeps
//! every message.
//!
//! ## Security
//!
//! - Access tokens are redacted in `Debug` output
//! - Tracing spans skip credentials and record payloads
//! - Error messages sanitize any token or session id they echo
//!
//! ## Crates
//!
//! - **sf-dataload-client** - Transport and authentication seams, retrying HTTP client, API error decoding
//! - **sf-dataload-dml** - Record adaptation, batching, composite building, error aggregation, DML executor
//! - **sf-dataload-bulk** - Bulk API 2.0 ingest job controller, CSV codec, bounded polling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sf_dataload::{DmlExecutor, DmlOptions, SalesforceClient};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SalesforceClient::new("https://myorg.my.salesforce.com", "access_token")?;
//!     let dml = DmlExecutor::new(client);
//!
//!     let accounts: Vec<_> = (0..450)
//!         .map(|i| json!({"Name": format!("Account {}", i)}))
//!         .collect();
//!
//!     // Three collection calls: 200, 200 and 50 records.
//!     let results = dml
//!         .insert_collection("Account", &accounts, &DmlOptions::default())
//!         .await?;
//!     println!("Inserted {} accounts", results.len());
//!
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
#[cfg(feature = "bulk")]
pub use sf_dataload_bulk as bulk;
#[cfg(feature = "client")]
pub use sf_dataload_client as client;
#[cfg(feature = "dml")]
pub use sf_dataload_dml as dml;

// Re-export commonly used types at the top level
#[cfg(feature = "bulk")]
pub use sf_dataload_bulk::{BulkJobController, BulkOperation, BulkOptions, PollConfig};
#[cfg(feature = "client")]
pub use sf_dataload_client::{ClientConfig, SalesforceClient, StaticAuthenticator};
#[cfg(feature = "dml")]
pub use sf_dataload_dml::{DmlExecutor, DmlOperation, DmlOptions, ExecutionMode, RecordAdapter};
