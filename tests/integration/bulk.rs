//! Bulk API 2.0 ingest jobs against a mock org.

use std::time::Duration;

use super::common::{accounts, client, existing_accounts, DATA};
use serde_json::json;
use sf_dataload::bulk::{
    BulkJobController, BulkOperation, BulkOptions, ErrorKind, JobState, PollConfig,
};
use wiremock::matchers::{body_json, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const JOB_ID: &str = "7505e00000AbCdE";

fn ingest_path() -> String {
    format!("{}/jobs/ingest", DATA)
}

fn job_path() -> String {
    format!("{}/{}", ingest_path(), JOB_ID)
}

fn controller(server: &MockServer) -> BulkJobController {
    BulkJobController::new(client(server)).with_poll_config(
        PollConfig::new()
            .with_interval(Duration::from_millis(20))
            .with_timeout(Duration::from_millis(250)),
    )
}

fn job(state: JobState) -> serde_json::Value {
    json!({"id": JOB_ID, "state": state, "object": "Account", "apiVersion": 62.0})
}

/// Create, upload and close succeed; the status endpoint answers with `status`.
async fn mount_lifecycle(server: &MockServer, status: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(ingest_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(job(JobState::Open)))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/batches", job_path())))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(job_path()))
        .and(body_json(json!({"state": "UploadComplete"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(job(JobState::UploadComplete)))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(job_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(status))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_clean_insert_returns_job_id() {
    let server = MockServer::start().await;
    mount_lifecycle(
        &server,
        json!({
            "id": JOB_ID,
            "state": "JobComplete",
            "numberRecordsProcessed": 3,
            "numberRecordsFailed": 0
        }),
    )
    .await;

    let job_id = controller(&server)
        .execute("Account", BulkOperation::Insert, &accounts(3), &BulkOptions::default())
        .await
        .unwrap();

    assert_eq!(job_id, JOB_ID);
}

#[tokio::test]
async fn test_update_with_failed_records_returns_report() {
    let report = "\"sf__Id\",\"sf__Error\",Id,Name\n\
                  \"\",\"ENTITY_IS_DELETED:entity is deleted:--\",001000000000000,Account 0\n\
                  \"\",\"ENTITY_IS_DELETED:entity is deleted:--\",001000000000001,Account 1\n\
                  \"\",\"ENTITY_IS_DELETED:entity is deleted:--\",001000000000002,Account 2\n";

    let server = MockServer::start().await;
    mount_lifecycle(
        &server,
        json!({
            "id": JOB_ID,
            "state": "JobComplete",
            "numberRecordsProcessed": 5,
            "numberRecordsFailed": 3,
            "errorMessage": ""
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/failedResults", job_path())))
        .respond_with(ResponseTemplate::new(200).set_body_string(report))
        .expect(1)
        .mount(&server)
        .await;

    let err = controller(&server)
        .execute(
            "Account",
            BulkOperation::Update,
            &existing_accounts(5),
            &BulkOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::FailedRecords { count: 3, .. }));
    assert_eq!(err.to_string(), report);
    assert_eq!(err.job_id(), Some(JOB_ID));
}

#[tokio::test]
async fn test_poll_times_out_when_job_never_finishes() {
    let server = MockServer::start().await;
    mount_lifecycle(&server, job(JobState::InProgress)).await;

    let err = controller(&server)
        .execute("Account", BulkOperation::Insert, &accounts(2), &BulkOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Timeout(_)));
    assert!(err.is_job_error());
    assert_eq!(err.job_id(), Some(JOB_ID));

    let polls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert!(polls >= 2, "expected repeated status checks, saw {}", polls);
}

#[tokio::test]
async fn test_upsert_job_names_external_id_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ingest_path()))
        .and(body_json(json!({
            "object": "Contact",
            "operation": "upsert",
            "externalIdFieldName": "External_Id__c",
            "contentType": "CSV",
            "columnDelimiter": "COMMA",
            "lineEnding": "LF"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job(JobState::Open)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/batches", job_path())))
        .and(body_string(
            "External_Id__c,LastName,Account.External_Id__c\nC-1,Lovelace,A-1\n",
        ))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(job_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(job(JobState::UploadComplete)))
        .expect(1)
        .mount(&server)
        .await;

    let records = vec![json!({
        "External_Id__c": "C-1",
        "LastName": "Lovelace",
        "Account": {"attributes": {"type": "Account"}, "External_Id__c": "A-1"}
    })];
    let job_id = controller(&server)
        .execute(
            "Contact",
            BulkOperation::Upsert,
            &records,
            &BulkOptions::new()
                .with_external_id_field("External_Id__c")
                .with_wait_for_results(false),
        )
        .await
        .unwrap();

    assert_eq!(job_id, JOB_ID);
}
