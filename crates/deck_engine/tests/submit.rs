use std::sync::Arc;

use deck_engine::{
    build_client, ApiSettings, FailureKind, HttpApi, HttpSettings, JobSubmitter, RecordId,
    Session, SubmissionFailure,
};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn submitter(server: &MockServer) -> JobSubmitter {
    let client = build_client(&HttpSettings::default()).unwrap();
    let api = HttpApi::new(
        client,
        &ApiSettings {
            base_url: server.uri(),
        },
    )
    .unwrap();
    JobSubmitter::new(Arc::new(api))
}

#[tokio::test]
async fn text_only_job_returns_process_id() {
    deck_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({
            "message": "Quarterly review for the board",
            "file_ids": [],
            "num_slides": 12,
            "user_id": "user-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"process_id": "J1"})))
        .expect(1)
        .mount(&server)
        .await;

    let job = submitter(&server)
        .submit("Quarterly review for the board", &[], 12, &Session::new("user-1"))
        .await
        .unwrap();

    assert_eq!(job, "J1");
}

#[tokio::test]
async fn artifact_ids_keep_their_json_type() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(json!({
            "message": "",
            "file_ids": [7, "a1b2", "007", "12"],
            "num_slides": 10,
            "user_id": "user-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"process_id": 99})))
        .expect(1)
        .mount(&server)
        .await;

    let job = submitter(&server)
        .submit(
            "",
            &[
                RecordId::from(7),
                RecordId::from("a1b2"),
                RecordId::from("007"),
                RecordId::from("12"),
            ],
            10,
            &Session::new("user-1"),
        )
        .await
        .unwrap();

    assert_eq!(job, "99");
}

#[tokio::test]
async fn missing_process_id_is_a_failure() {
    deck_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "accepted"})))
        .mount(&server)
        .await;

    let err = submitter(&server)
        .submit("hello", &[], 10, &Session::new("user-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionFailure::MissingJobId));
}

#[tokio::test]
async fn blank_request_is_rejected_without_network() {
    let server = MockServer::start().await;

    let err = submitter(&server)
        .submit("   ", &[], 10, &Session::new("user-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SubmissionFailure::EmptyRequest));
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}

#[tokio::test]
async fn server_error_maps_to_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = submitter(&server)
        .submit("hello", &[], 10, &Session::new("user-1"))
        .await
        .unwrap_err();

    match err {
        SubmissionFailure::Transport(source) => {
            assert_eq!(source.kind, FailureKind::HttpStatus(503))
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}
