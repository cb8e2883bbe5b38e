//! Composite transactions against a mock org.

use super::common::{accounts, client, collection_results, existing_accounts, received_bodies, DATA};
use serde_json::{json, Value};
use sf_dataload::dml::{DmlExecutor, DmlOptions, ErrorKind, MAX_SUBREQUESTS};
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn composite_path() -> String {
    format!("{}/composite", DATA)
}

/// Answers each collection subrequest with per-record results.
fn echo_composite(request: &Request) -> ResponseTemplate {
    let body: Value = serde_json::from_slice(&request.body).unwrap();
    let responses: Vec<Value> = body["compositeRequest"]
        .as_array()
        .unwrap()
        .iter()
        .map(|sub| {
            let records = sub["body"]["records"].as_array().cloned().unwrap_or_default();
            json!({
                "body": collection_results(&records),
                "httpHeaders": {},
                "httpStatusCode": 200,
                "referenceId": sub["referenceId"]
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "compositeResponse": responses }))
}

#[tokio::test]
async fn test_thirty_batches_fail_validation_without_io() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .insert_composite("Account", &accounts(300), &DmlOptions::new().with_batch_size(10))
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(matches!(
        err.kind,
        ErrorKind::SubrequestLimit {
            batches: 30,
            max: MAX_SUBREQUESTS
        }
    ));
}

#[tokio::test]
async fn test_insert_composite_single_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(composite_path()))
        .respond_with(echo_composite)
        .expect(1)
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let results = dml
        .insert_composite(
            "Account",
            &accounts(450),
            &DmlOptions::new().with_all_or_none(true),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 450);

    let bodies = received_bodies(&server).await;
    let request = &bodies[0];
    assert_eq!(request["allOrNone"], true);

    let subs = request["compositeRequest"].as_array().unwrap();
    assert_eq!(subs.len(), 3);
    for (i, sub) in subs.iter().enumerate() {
        assert_eq!(sub["referenceId"], format!("refObj{}", i));
        assert_eq!(sub["method"], "POST");
        assert_eq!(sub["url"], format!("{}/composite/sobjects", DATA));
    }
    assert_eq!(subs[1]["body"]["records"][0]["Name"], "Account 200");
    assert_eq!(subs[2]["body"]["records"].as_array().unwrap().len(), 50);
}

#[tokio::test]
async fn test_composite_stops_at_first_failed_subresponse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(composite_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "compositeResponse": [
                {
                    "body": [{"id": "001000000000000", "success": true, "errors": []}],
                    "httpHeaders": {},
                    "httpStatusCode": 200,
                    "referenceId": "refObj0"
                },
                {
                    "body": [{"errorCode": "PROCESSING_HALTED", "message": "The transaction was rolled back"}],
                    "httpHeaders": {},
                    "httpStatusCode": 400,
                    "referenceId": "refObj1"
                },
                {
                    "body": [{"errorCode": "PROCESSING_HALTED", "message": "not reached"}],
                    "httpHeaders": {},
                    "httpStatusCode": 400,
                    "referenceId": "refObj2"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .update_composite(
            "Account",
            &existing_accounts(3),
            &DmlOptions::new().with_batch_size(1),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(
        err.to_string(),
        "API error: PROCESSING_HALTED: The transaction was rolled back"
    );
}

#[tokio::test]
async fn test_composite_record_failure_is_aggregated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(composite_path()))
        .respond_with(echo_composite)
        .expect(1)
        .mount(&server)
        .await;

    let mut records = accounts(4);
    records[3]["Name"] = json!("fail");

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .insert_composite("Account", &records, &DmlOptions::new().with_batch_size(2))
        .await
        .unwrap_err();

    let agg = err.aggregate().expect("aggregate error");
    assert_eq!(agg.len(), 1);
    assert!(agg.messages()[0].starts_with("FIELD_CUSTOM_VALIDATION_EXCEPTION: "));
}

#[tokio::test]
async fn test_composite_envelope_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(composite_path()))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!([
            {"errorCode": "JSON_PARSER_ERROR", "message": "Unexpected character"}
        ])))
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .delete_composite("Account", &existing_accounts(2), &DmlOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("JSON_PARSER_ERROR"));
}
