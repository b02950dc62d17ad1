use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use std::sync::Arc;
use tracing::error;

use crate::{clients::billing::CheckoutOutcome, session::AuthSession, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/checkout", post(checkout))
}

#[utoipa::path(
    post,
    path = "/api/billing/checkout",
    tag = "billing",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Checkout redirect URL, or a message when already subscribed"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Payment provider call failed")
    )
)]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    AuthSession(entry): AuthSession,
) -> Response {
    match state
        .billing
        .create_checkout(&entry.session.access_token())
        .await
    {
        Ok(CheckoutOutcome::Redirect { url }) => {
            (StatusCode::OK, Json(serde_json::json!({ "url": url }))).into_response()
        }
        Ok(CheckoutOutcome::AlreadySubscribed { message }) => {
            (StatusCode::OK, Json(serde_json::json!({ "message": message }))).into_response()
        }
        Err(e) => {
            error!(user_id = %entry.session.user_id, "checkout creation failed: {e}");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
