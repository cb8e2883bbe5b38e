//! sObject Collections payloads and per-record result types.

use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Request body for sObject Collections operations.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionRequest {
    #[serde(rename = "allOrNone")]
    pub all_or_none: bool,
    pub records: Vec<Record>,
}

/// Result of one record in a collection or composite operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CollectionResult {
    pub id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

impl CollectionResult {
    /// A successful result without a body.
    pub(crate) fn succeeded(id: Option<String>, created: Option<bool>) -> Self {
        Self {
            id,
            success: true,
            errors: Vec::new(),
            created,
        }
    }
}

/// Result of a single-record create.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateResult {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
}

/// Result of a single-record upsert.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpsertResult {
    pub id: String,
    pub success: bool,
    pub created: bool,
    #[serde(default)]
    pub errors: Vec<SalesforceError>,
}

/// Salesforce error in operation results.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SalesforceError {
    #[serde(rename = "statusCode")]
    pub status_code: String,
    pub message: String,
    #[serde(default)]
    pub fields: Vec<String>,
}
