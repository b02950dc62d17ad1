use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    models::{CredentialsRequest, PlanTier, SessionResponse, SubscriptionResponse, UserResponse},
    session::AuthSession,
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
        .route("/me", get(me))
        .route("/subscription", get(subscription))
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Account created, pending email confirmation"),
        (status = 400, description = "Bad request - provider rejected the registration")
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<CredentialsRequest>,
) -> Response {
    match state
        .identity
        .sign_up(&credentials.email, &credentials.password)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "Check your email to confirm your account"
            })),
        )
            .into_response(),
        Err(e) => {
            warn!("sign-up rejected: {e}");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/signin",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Sign-in successful", body = SessionResponse),
        (status = 401, description = "Unauthorized - invalid credentials")
    )
)]
pub async fn signin(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<CredentialsRequest>,
) -> Response {
    let session = match state
        .identity
        .sign_in(&credentials.email, &credentials.password)
        .await
    {
        Ok(session) => session,
        Err(e) => {
            warn!("sign-in rejected: {e}");
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let plan = match state
        .profiles
        .get_profile(&session.access_token, session.user.id)
        .await
    {
        Ok(profile) => profile.plan,
        Err(e) => {
            warn!(user_id = %session.user.id, "profile unavailable at sign-in, assuming free plan: {e}");
            PlanTier::default()
        }
    };

    let entry = state.build_session(
        session.user.clone(),
        session.access_token.clone(),
        plan,
    );
    state.sessions.insert(entry);
    info!(user_id = %session.user.id, %plan, "session created");

    (
        StatusCode::OK,
        Json(SessionResponse {
            access_token: session.access_token,
            user_id: session.user.id,
            email: session.user.email,
            plan,
        }),
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/auth/signout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Session torn down"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn signout(
    State(state): State<Arc<AppState>>,
    AuthSession(entry): AuthSession,
) -> Response {
    // Provider-side sign-out is best effort; the local session goes away
    // either way.
    if let Err(e) = state.identity.sign_out(&entry.session.access_token()).await {
        warn!(user_id = %entry.session.user_id, "provider sign-out failed: {e}");
    }
    state.sessions.remove(entry.session.user_id);
    info!(user_id = %entry.session.user_id, "session torn down");
    (StatusCode::OK, Json(serde_json::json!({ "signed_out": true }))).into_response()
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn me(AuthSession(entry): AuthSession) -> Json<UserResponse> {
    Json(UserResponse {
        user_id: entry.session.user_id,
        email: entry.session.email.clone(),
        plan: entry.session.plan(),
    })
}

#[utoipa::path(
    get,
    path = "/api/auth/subscription",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Subscription status", body = SubscriptionResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn subscription(
    State(state): State<Arc<AppState>>,
    AuthSession(entry): AuthSession,
) -> Response {
    let token = entry.session.access_token();
    let subscribed = match state.identity.check_subscription(&token).await {
        Ok(subscribed) => subscribed,
        Err(e) => {
            warn!(user_id = %entry.session.user_id, "subscription check failed: {e}");
            false
        }
    };

    if subscribed && entry.session.plan() != PlanTier::Premium {
        // An active subscription upgrades the stored plan immediately; the
        // store write is best effort, the session copy always follows.
        if let Err(e) = state
            .profiles
            .update_plan(&token, entry.session.user_id, PlanTier::Premium)
            .await
        {
            warn!(user_id = %entry.session.user_id, "plan upgrade write failed: {e}");
        }
        entry.session.set_plan(PlanTier::Premium);
        info!(user_id = %entry.session.user_id, "session upgraded to premium");
    }

    (
        StatusCode::OK,
        Json(SubscriptionResponse {
            subscribed,
            plan: entry.session.plan(),
        }),
    )
        .into_response()
}
