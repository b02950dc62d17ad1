/*!
 * Pass-through clients for the identity provider, profile store and payment
 * checkout, exercised against mocked backend endpoints.
 */

use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use decryptimage::clients::billing::{BillingClient, CheckoutOutcome};
use decryptimage::clients::identity::IdentityClient;
use decryptimage::clients::profiles::ProfileStore;
use decryptimage::clients::BackendError;
use decryptimage::models::PlanTier;

fn identity(server: &MockServer) -> IdentityClient {
    IdentityClient::new(reqwest::Client::new(), &server.uri(), "anon-key")
}

fn profiles(server: &MockServer) -> ProfileStore {
    ProfileStore::new(reqwest::Client::new(), &server.uri(), "anon-key")
}

fn billing(server: &MockServer) -> BillingClient {
    BillingClient::new(reqwest::Client::new(), &server.uri(), "anon-key")
}

#[tokio::test]
async fn test_sign_in_returns_token_and_user() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon-key"))
        .and(body_partial_json(json!({ "email": "user@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-abc",
            "user": { "id": user_id, "email": "user@example.com" }
        })))
        .mount(&server)
        .await;

    let session = identity(&server)
        .sign_in("user@example.com", "hunter2")
        .await
        .expect("sign-in should succeed");

    assert_eq!(session.access_token, "jwt-abc");
    assert_eq!(session.user.id, user_id);
    assert_eq!(session.user.email, "user@example.com");
}

#[tokio::test]
async fn test_sign_in_failure_surfaces_provider_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let err = identity(&server)
        .sign_in("user@example.com", "wrong")
        .await
        .expect_err("bad credentials should fail");

    match err {
        BackendError::Api { message, .. } => {
            assert_eq!(message, "Invalid login credentials");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_get_user_resolves_bearer_token() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": user_id,
            "email": "user@example.com"
        })))
        .mount(&server)
        .await;

    let user = identity(&server)
        .get_user("jwt-abc")
        .await
        .expect("valid token should resolve");
    assert_eq!(user.id, user_id);
}

#[tokio::test]
async fn test_check_subscription_reads_flag_leniently() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/check-subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "subscribed": true })))
        .mount(&server)
        .await;
    assert!(identity(&server).check_subscription("jwt").await.unwrap());

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/check-subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "stripe unreachable", "subscribed": false
        })))
        .mount(&server)
        .await;
    assert!(!identity(&server).check_subscription("jwt").await.unwrap());

    // A body without the flag reads as not subscribed.
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/check-subscription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    assert!(!identity(&server).check_subscription("jwt").await.unwrap());
}

#[tokio::test]
async fn test_get_profile_reads_plan_row() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{user_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "plan": "premium", "stripe_customer_id": "cus_123" }
        ])))
        .mount(&server)
        .await;

    let profile = profiles(&server)
        .get_profile("jwt", user_id)
        .await
        .expect("profile row should parse");
    assert_eq!(profile.plan, PlanTier::Premium);
    assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_123"));
}

#[tokio::test]
async fn test_missing_profile_row_is_a_payload_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let err = profiles(&server)
        .get_profile("jwt", Uuid::new_v4())
        .await
        .expect_err("empty row set should fail");
    assert!(matches!(err, BackendError::Payload(_)));
}

#[tokio::test]
async fn test_update_plan_patches_profile_row() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", format!("eq.{user_id}")))
        .and(body_partial_json(json!({ "plan": "premium" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    profiles(&server)
        .update_plan("jwt", user_id, PlanTier::Premium)
        .await
        .expect("plan update should succeed");
}

#[tokio::test]
async fn test_checkout_redirect_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/create-checkout"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://checkout.stripe.com/c/pay/cs_test_123"
        })))
        .mount(&server)
        .await;

    let outcome = billing(&server)
        .create_checkout("jwt-abc")
        .await
        .expect("checkout should succeed");
    assert_eq!(
        outcome,
        CheckoutOutcome::Redirect {
            url: "https://checkout.stripe.com/c/pay/cs_test_123".to_string()
        }
    );
}

#[tokio::test]
async fn test_checkout_already_subscribed_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/create-checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "You already have an active subscription"
        })))
        .mount(&server)
        .await;

    let outcome = billing(&server)
        .create_checkout("jwt")
        .await
        .expect("checkout should succeed");
    assert!(matches!(outcome, CheckoutOutcome::AlreadySubscribed { .. }));
}

#[tokio::test]
async fn test_checkout_unexpected_body_is_a_payload_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/functions/v1/create-checkout"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    let err = billing(&server)
        .create_checkout("jwt")
        .await
        .expect_err("body without url or message should fail");
    assert!(matches!(err, BackendError::Payload(_)));
}
