//! Single-record and sObject Collections DML against a mock org.

use super::common::{
    accounts, client, collection_results, echo_collection, existing_accounts, received_bodies,
    DATA,
};
use serde_json::{json, Value};
use sf_dataload::dml::{DmlExecutor, DmlOptions, ErrorKind};
use wiremock::matchers::{any, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn collections_path() -> String {
    format!("{}/composite/sobjects", DATA)
}

#[tokio::test]
async fn test_insert_450_records_in_three_ordered_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(collections_path()))
        .respond_with(echo_collection)
        .expect(3)
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let results = dml
        .insert_collection("Account", &accounts(450), &DmlOptions::default())
        .await
        .unwrap();

    assert_eq!(results.len(), 450);
    assert!(results.iter().all(|r| r.success));

    let bodies = received_bodies(&server).await;
    let sizes: Vec<usize> = bodies
        .iter()
        .map(|b| b["records"].as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![200, 200, 50]);

    let firsts: Vec<&Value> = bodies.iter().map(|b| &b["records"][0]["Name"]).collect();
    assert_eq!(firsts, vec!["Account 0", "Account 200", "Account 400"]);
    assert_eq!(bodies[2]["records"][49]["Name"], "Account 449");
    assert_eq!(bodies[0]["records"][0]["attributes"]["type"], "Account");
    assert_eq!(bodies[0]["allOrNone"], false);
}

#[tokio::test]
async fn test_update_collection_continues_after_failed_batches() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(collections_path()))
        .respond_with(|request: &Request| {
            let body: Value = serde_json::from_slice(&request.body).unwrap();
            let records = body["records"].as_array().cloned().unwrap_or_default();
            if records.iter().any(|r| r["Name"] == "boom") {
                return ResponseTemplate::new(400).set_body_json(json!([
                    {"errorCode": "INVALID_FIELD", "message": "No such column 'Nme'"}
                ]));
            }
            ResponseTemplate::new(200).set_body_json(collection_results(&records))
        })
        .expect(3)
        .mount(&server)
        .await;

    let mut records = existing_accounts(5);
    records[1]["Name"] = json!("fail");
    records[2]["Name"] = json!("boom");

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .update_collection("Account", &records, &DmlOptions::new().with_batch_size(2))
        .await
        .unwrap_err();

    let agg = err.aggregate().expect("aggregate error");
    assert_eq!(
        agg.messages(),
        vec![
            "FIELD_CUSTOM_VALIDATION_EXCEPTION: rejected 001000000000001 001000000000001"
                .to_string(),
            "INVALID_FIELD: No such column 'Nme'".to_string(),
        ]
    );
    let rendered = err.to_string();
    assert!(rendered.contains("FIELD_CUSTOM_VALIDATION_EXCEPTION"));
    assert!(rendered.contains("INVALID_FIELD"));
}

#[tokio::test]
async fn test_delete_collection_stops_at_first_failed_batch() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(collections_path()))
        .and(query_param("allOrNone", "false"))
        .respond_with(|request: &Request| {
            let ids: Vec<String> = request
                .url
                .query_pairs()
                .find(|(k, _)| k == "ids")
                .map(|(_, v)| v.split(',').map(String::from).collect())
                .unwrap_or_default();
            let results: Vec<Value> = ids
                .iter()
                .enumerate()
                .map(|(i, id)| {
                    if i == 0 {
                        json!({"id": id, "success": false, "errors": [
                            {"statusCode": "ENTITY_IS_DELETED", "message": "entity is deleted", "fields": []}
                        ]})
                    } else {
                        json!({"id": id, "success": true, "errors": []})
                    }
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(results)
        })
        .expect(1)
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .delete_collection(
            "Account",
            &existing_accounts(5),
            &DmlOptions::new().with_batch_size(2),
        )
        .await
        .unwrap_err();

    let agg = err.aggregate().expect("aggregate error");
    assert_eq!(
        agg.messages(),
        vec!["ENTITY_IS_DELETED: entity is deleted 001000000000000".to_string()]
    );
}

#[tokio::test]
async fn test_upsert_missing_external_id_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut records: Vec<Value> = (0..10)
        .map(|i| json!({"External_Id__c": format!("C-{}", i), "LastName": format!("Contact {}", i)}))
        .collect();
    records[5]
        .as_object_mut()
        .unwrap()
        .remove("External_Id__c");

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .upsert_collection("Contact", "External_Id__c", &records, &DmlOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_validation());
    match &err.kind {
        ErrorKind::MissingIdentifier {
            sobject,
            field,
            index,
        } => {
            assert_eq!(sobject, "Contact");
            assert_eq!(field, "External_Id__c");
            assert_eq!(*index, 5);
        }
        other => panic!("unexpected kind: {other:?}"),
    }
    let rendered = err.to_string();
    assert!(rendered.contains("External_Id__c"));
    assert!(rendered.contains("Contact"));
}

#[tokio::test]
async fn test_oversized_batch_is_rejected_before_io() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .insert_collection("Account", &accounts(3), &DmlOptions::new().with_batch_size(201))
        .await
        .unwrap_err();

    assert!(err.is_validation());
}

#[tokio::test]
async fn test_upsert_collection_keeps_external_id_in_body() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/Contact/External_Id__c", collections_path())))
        .respond_with(echo_collection)
        .expect(1)
        .mount(&server)
        .await;

    let records = vec![json!({"Id": "003A", "External_Id__c": "C-1", "LastName": "Lovelace"})];
    let dml = DmlExecutor::new(client(&server));
    dml.upsert_collection("Contact", "External_Id__c", &records, &DmlOptions::default())
        .await
        .unwrap();

    let bodies = received_bodies(&server).await;
    let sent = &bodies[0]["records"][0];
    assert_eq!(sent["External_Id__c"], "C-1");
    assert!(sent.get("Id").is_none());
    assert_eq!(sent["attributes"]["type"], "Contact");
}

#[tokio::test]
async fn test_single_update_reports_structured_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/sobjects/Account/001000000000000", DATA)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!([
            {"errorCode": "NOT_FOUND", "message": "The requested resource does not exist"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let dml = DmlExecutor::new(client(&server));
    let err = dml
        .update_one("Account", &existing_accounts(1)[0])
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(
        err.to_string(),
        "API error: NOT_FOUND: The requested resource does not exist"
    );
}
