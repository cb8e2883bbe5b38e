use serde_json::{json, Value};
use sf_dataload::{ClientConfig, SalesforceClient};
use wiremock::{MockServer, Request, ResponseTemplate};

/// Data API prefix for the default API version.
pub const DATA: &str = "/services/data/v62.0";

/// Route tracing output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client pointed at `server`, with retries off so error statuses reach
/// the caller on the first attempt.
pub fn client(server: &MockServer) -> SalesforceClient {
    init_tracing();
    SalesforceClient::with_config(
        server.uri(),
        "00Dxx0000000000!test-token",
        ClientConfig::builder().without_retry().build(),
    )
    .expect("client should build")
}

pub fn accounts(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"Name": format!("Account {}", i)}))
        .collect()
}

/// Records with ids, for update and delete.
pub fn existing_accounts(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"Id": format!("001{:012}", i), "Name": format!("Account {}", i)}))
        .collect()
}

/// One result entry per record in a collection payload. A record named
/// `fail` gets a validation failure, everything else succeeds.
pub fn collection_results(records: &[Value]) -> Value {
    Value::Array(
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let id = record["Id"]
                    .as_str()
                    .map(String::from)
                    .unwrap_or_else(|| format!("001NEW{:09}", i));
                if record["Name"] == "fail" {
                    json!({
                        "id": null,
                        "success": false,
                        "errors": [{
                            "statusCode": "FIELD_CUSTOM_VALIDATION_EXCEPTION",
                            "message": format!("rejected {}", id),
                            "fields": ["Name"]
                        }]
                    })
                } else {
                    json!({"id": id, "success": true, "errors": []})
                }
            })
            .collect(),
    )
}

/// Responder for collection endpoints: echoes one result per submitted record.
pub fn echo_collection(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).expect("collection body is JSON");
    let records = body["records"].as_array().cloned().unwrap_or_default();
    ResponseTemplate::new(200).set_body_json(collection_results(&records))
}

/// Parsed JSON bodies of every request the server received, in order.
pub async fn received_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}
