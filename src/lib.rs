/*!
 * DecryptImage - extract text from images and PDFs.
 *
 * A thin web service around one external OCR webhook: uploads are validated
 * against the user's plan, forwarded to the webhook, the loosely-typed reply
 * is normalized to a single outcome, and successful extractions are counted
 * against a monthly quota. Identity, profile rows and payment checkout are
 * delegated to external providers and consumed over HTTP.
 */

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    response::Json,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;

pub mod clients;
pub mod config;
pub mod extraction;
pub mod models;
pub mod routes;
pub mod session;


use clients::billing::BillingClient;
use clients::identity::{AuthenticatedUser, IdentityClient};
use clients::profiles::ProfileStore;
use config::Config;
use extraction::controller::UploadController;
use extraction::quota::QuotaTracker;
use extraction::submission::SubmissionClient;
use models::PlanTier;
use session::{SessionContext, SessionEntry, SessionRegistry};

pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub identity: IdentityClient,
    pub profiles: Arc<ProfileStore>,
    pub billing: BillingClient,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::new();
        let identity = IdentityClient::new(
            http.clone(),
            &config.backend_base_url,
            &config.backend_api_key,
        );
        let profiles = Arc::new(ProfileStore::new(
            http.clone(),
            &config.backend_base_url,
            &config.backend_api_key,
        ));
        let billing = BillingClient::new(
            http.clone(),
            &config.backend_base_url,
            &config.backend_api_key,
        );
        Self {
            config,
            http,
            identity,
            profiles,
            billing,
            sessions: SessionRegistry::new(),
        }
    }

    /// Build the session-scoped objects for one signed-in user: the context,
    /// its quota tracker and its single upload controller.
    pub fn build_session(
        &self,
        user: AuthenticatedUser,
        access_token: String,
        plan: PlanTier,
    ) -> SessionEntry {
        let session = Arc::new(SessionContext::new(user.id, user.email, plan, access_token));
        let quota = Arc::new(QuotaTracker::new(
            Arc::clone(&session),
            Arc::clone(&self.profiles),
        ));
        let submission = SubmissionClient::new(self.http.clone(), &self.config.ocr_webhook_url);
        let controller = Arc::new(UploadController::new(
            Arc::clone(&session),
            submission,
            Arc::clone(&quota),
        ));
        SessionEntry {
            session,
            quota,
            controller,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::auth::signup,
        routes::auth::signin,
        routes::auth::signout,
        routes::auth::me,
        routes::auth::subscription,
        routes::extract::extract,
        routes::extract::progress,
        routes::extract::usage,
        routes::billing::checkout,
    ),
    components(schemas(
        models::CredentialsRequest,
        models::SessionResponse,
        models::UserResponse,
        models::SubscriptionResponse,
        models::UsageResponse,
        models::ProgressResponse,
        models::ExtractionOutcome,
        models::PlanTier,
    )),
    tags(
        (name = "auth", description = "Session management, delegated to the identity provider"),
        (name = "extraction", description = "File submission, OCR normalization and quota"),
        (name = "billing", description = "Checkout pass-through to the payment provider")
    )
)]
pub struct ApiDoc;

pub fn app_router(state: Arc<AppState>) -> Router {
    let cors = match &state.config.cors_allowed_origins {
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::permissive(),
    };

    Router::new()
        .nest("/api/auth", routes::auth::router())
        .nest("/api/extract", routes::extract::router())
        .nest("/api/billing", routes::billing::router())
        .route("/api/usage", get(routes::extract::usage))
        .route("/api/health", get(health))
        .route("/api/openapi.json", get(openapi_spec))
        .fallback_service(ServeDir::new(&state.config.frontend_path))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
