use axum::{
    extract::Multipart,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{Datelike, Utc};
use std::sync::Arc;
use tracing::warn;

use crate::{
    extraction::controller::SubmitRefused,
    models::{ExtractionOutcome, ProgressResponse, UploadCandidate, UsageResponse},
    session::AuthSession,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(extract))
        .route("/progress", get(progress))
}

#[utoipa::path(
    post,
    path = "/api/extract",
    tag = "extraction",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Extraction outcome, success or failure", body = ExtractionOutcome),
        (status = 400, description = "Missing file field or validation rejection"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "A submission is already in progress"),
        (status = 429, description = "Monthly extraction limit reached")
    )
)]
pub async fn extract(
    AuthSession(entry): AuthSession,
    mut multipart: Multipart,
) -> Response {
    let candidate = match read_file_field(&mut multipart).await {
        Ok(Some(candidate)) => candidate,
        Ok(None) => {
            return error_response(StatusCode::BAD_REQUEST, "Missing multipart field \"file\"");
        }
        Err(message) => {
            return error_response(StatusCode::BAD_REQUEST, &message);
        }
    };

    match entry.controller.submit(candidate).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(refused @ SubmitRefused::AlreadySubmitting) => {
            error_response(StatusCode::CONFLICT, &refused.to_string())
        }
        Err(refused @ SubmitRefused::Validation(_)) => {
            error_response(StatusCode::BAD_REQUEST, &refused.to_string())
        }
        Err(refused @ SubmitRefused::QuotaExhausted { .. }) => {
            error_response(StatusCode::TOO_MANY_REQUESTS, &refused.to_string())
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/extract/progress",
    tag = "extraction",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cosmetic progress of the in-flight submission", body = ProgressResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn progress(AuthSession(entry): AuthSession) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        progress: entry.controller.progress(),
    })
}

#[utoipa::path(
    get,
    path = "/api/usage",
    tag = "extraction",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current month usage against the tier limit", body = UsageResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn usage(AuthSession(entry): AuthSession) -> Json<UsageResponse> {
    let count = match entry.quota.refresh().await {
        Ok(count) => count,
        Err(e) => {
            warn!(user_id = %entry.session.user_id, "usage read fell back to cached count: {e}");
            entry.quota.cached_count()
        }
    };
    let now = Utc::now();
    let plan = entry.session.plan();
    Json(UsageResponse {
        month: now.month(),
        year: now.year(),
        count,
        limit: plan.monthly_extraction_limit(),
        plan,
    })
}

/// Pull the "file" part out of the multipart body. The declared content type
/// falls back to a filename-based guess when the part carries none.
async fn read_file_field(
    multipart: &mut Multipart,
) -> Result<Option<UploadCandidate>, String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Malformed multipart body: {e}"))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = match field.content_type() {
            Some(mime) => mime.to_string(),
            None => mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .essence_str()
                .to_string(),
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| format!("Failed to read file field: {e}"))?
            .to_vec();
        return Ok(Some(UploadCandidate {
            filename,
            content_type,
            data,
        }));
    }
    Ok(None)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
