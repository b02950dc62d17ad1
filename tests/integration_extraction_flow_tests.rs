/*!
 * End-to-end controller flow against mocked OCR webhook and counter store:
 * validation gate, quota gate, response normalization and quota accounting.
 */

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use decryptimage::clients::profiles::ProfileStore;
use decryptimage::extraction::controller::{ControllerState, SubmitRefused, UploadController};
use decryptimage::extraction::quota::QuotaTracker;
use decryptimage::extraction::submission::SubmissionClient;
use decryptimage::models::{ExtractionOutcome, PlanTier, UploadCandidate};
use decryptimage::session::SessionContext;

fn png_candidate() -> UploadCandidate {
    UploadCandidate {
        filename: "scan.png".to_string(),
        content_type: "image/png".to_string(),
        data: vec![0u8; 512],
    }
}

fn build_controller(
    ocr_url: &str,
    store_url: &str,
    plan: PlanTier,
) -> Arc<UploadController> {
    let http = reqwest::Client::new();
    let session = Arc::new(SessionContext::new(
        Uuid::new_v4(),
        "user@example.com".to_string(),
        plan,
        "token-123".to_string(),
    ));
    let store = Arc::new(ProfileStore::new(http.clone(), store_url, "anon-key"));
    let quota = Arc::new(QuotaTracker::new(Arc::clone(&session), store));
    let submission = SubmissionClient::new(http, ocr_url);
    Arc::new(UploadController::new(session, submission, quota))
}

async fn mount_counter_read(store: &MockServer, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/extractions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(store)
        .await;
}

#[tokio::test]
async fn test_nested_envelope_success_records_one_extraction() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "ParsedText": "{\"ParsedResults\":[{\"ParsedText\":\"Hello world\"}]}" }
        ])))
        .expect(1)
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/extractions"))
        .and(header("Prefer", "resolution=merge-duplicates"))
        .and(body_partial_json(json!({ "count": 1 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&store)
        .await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );
    let outcome = controller
        .submit(png_candidate())
        .await
        .expect("submission should be accepted");

    assert_eq!(
        outcome,
        ExtractionOutcome::Success {
            text: "Hello world".to_string()
        }
    );
    assert_eq!(controller.state(), ControllerState::Idle);
}

#[tokio::test]
async fn test_engine_error_consumes_no_quota() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "OCRExitCode": 3, "ErrorMessage": ["bad image", "low resolution"] }
        ])))
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([{ "count": 2 }])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/extractions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&store)
        .await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );
    let outcome = controller
        .submit(png_candidate())
        .await
        .expect("submission should be accepted");

    assert_eq!(
        outcome,
        ExtractionOutcome::Failure {
            message: "Error from OCR service: bad image. low resolution".to_string()
        }
    );
}

#[tokio::test]
async fn test_non_json_body_is_a_transport_failure_without_quota() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/extractions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&store)
        .await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );
    let outcome = controller
        .submit(png_candidate())
        .await
        .expect("submission should be accepted");

    match outcome {
        ExtractionOutcome::Failure { message } => {
            assert!(message.starts_with("Error: "), "got: {message}");
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unrecognized_shape_surfaces_payload_and_consumes_quota() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "foo": "bar" })))
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/extractions"))
        .and(body_partial_json(json!({ "count": 1 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&store)
        .await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );
    let outcome = controller
        .submit(png_candidate())
        .await
        .expect("submission should be accepted");

    match outcome {
        ExtractionOutcome::Success { text } => {
            assert!(text.starts_with("Raw API Response: "), "got: {text}");
            assert!(text.contains("\"foo\""));
        }
        other => panic!("expected diagnostic success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_exhausted_quota_refuses_before_any_ocr_call() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([{ "count": 10 }])).await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );
    let refused = controller
        .submit(png_candidate())
        .await
        .expect_err("free plan at 10 extractions must be refused");

    assert!(matches!(
        refused,
        SubmitRefused::QuotaExhausted { limit: 10, .. }
    ));
    assert_eq!(controller.state(), ControllerState::Idle);
}

#[tokio::test]
async fn test_premium_plan_not_exhausted_at_free_limit() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "ParsedResults": [{ "ParsedText": "Legacy text" }] }
        ])))
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([{ "count": 999 }])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/extractions"))
        .and(body_partial_json(json!({ "count": 1000 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&store)
        .await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Premium,
    );
    let outcome = controller
        .submit(png_candidate())
        .await
        .expect("999 of 1000 leaves room for one more");

    assert_eq!(
        outcome,
        ExtractionOutcome::Success {
            text: "Legacy text".to_string()
        }
    );
}

#[tokio::test]
async fn test_validation_rejects_before_any_network_call() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([])).await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );
    let candidate = UploadCandidate {
        filename: "notes.txt".to_string(),
        content_type: "text/plain".to_string(),
        data: vec![0u8; 16],
    };
    let refused = controller
        .submit(candidate)
        .await
        .expect_err("text/plain must be rejected");

    assert!(matches!(refused, SubmitRefused::Validation(_)));
}

#[tokio::test]
async fn test_second_submit_rejected_while_first_in_flight() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(400))
                .set_body_json(json!([
                    { "ParsedResults": [{ "ParsedText": "slow result" }] }
                ])),
        )
        .expect(1)
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/extractions"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&store)
        .await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );

    let first = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.submit(png_candidate()).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(controller.state(), ControllerState::Submitting);
    assert!(controller.progress() <= 90);

    let refused = controller
        .submit(png_candidate())
        .await
        .expect_err("second submit must be refused while the first is in flight");
    assert!(matches!(refused, SubmitRefused::AlreadySubmitting));

    let outcome = first
        .await
        .expect("first submission task should not panic")
        .expect("first submission should be accepted");
    assert_eq!(
        outcome,
        ExtractionOutcome::Success {
            text: "slow result".to_string()
        }
    );
    assert_eq!(controller.state(), ControllerState::Idle);
    assert_eq!(controller.progress(), 100);
}

#[tokio::test]
async fn test_counter_store_failure_does_not_revoke_extracted_text() {
    let ocr = MockServer::start().await;
    let store = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhook/Image2Text"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "ParsedResults": [{ "ParsedText": "Legacy text" }] }
        ])))
        .mount(&ocr)
        .await;
    mount_counter_read(&store, json!([])).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/extractions"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "store down" })),
        )
        .mount(&store)
        .await;

    let controller = build_controller(
        &format!("{}/webhook/Image2Text", ocr.uri()),
        &store.uri(),
        PlanTier::Free,
    );
    let outcome = controller
        .submit(png_candidate())
        .await
        .expect("submission should be accepted");

    // Accounting drift is tolerated; the text stays with the user.
    assert_eq!(
        outcome,
        ExtractionOutcome::Success {
            text: "Legacy text".to_string()
        }
    );
    assert_eq!(controller.state(), ControllerState::Idle);
}
