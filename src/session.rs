/*!
 * Explicit session state: one context per signed-in user, created at sign-in
 * and torn down at sign-out, threaded through the quota tracker and upload
 * controller instead of living as ambient shared state.
 */

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::extraction::controller::UploadController;
use crate::extraction::quota::QuotaTracker;
use crate::models::PlanTier;
use crate::AppState;

/// Per-user session state. The plan and token are the only mutable pieces:
/// the plan changes when a subscription check upgrades the user, the token
/// is refreshed from whatever bearer token the latest request carried.
pub struct SessionContext {
    pub user_id: Uuid,
    pub email: String,
    plan: RwLock<PlanTier>,
    access_token: RwLock<String>,
}

impl SessionContext {
    pub fn new(user_id: Uuid, email: String, plan: PlanTier, access_token: String) -> Self {
        Self {
            user_id,
            email,
            plan: RwLock::new(plan),
            access_token: RwLock::new(access_token),
        }
    }

    pub fn plan(&self) -> PlanTier {
        *self.plan.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_plan(&self, plan: PlanTier) {
        *self.plan.write().unwrap_or_else(PoisonError::into_inner) = plan;
    }

    pub fn access_token(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_access_token(&self, token: String) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// Everything built around one session: the context itself, its quota
/// tracker and its single upload controller.
#[derive(Clone)]
pub struct SessionEntry {
    pub session: Arc<SessionContext>,
    pub quota: Arc<QuotaTracker>,
    pub controller: Arc<UploadController>,
}

/// In-memory map of active sessions keyed by user id. Entries are inserted
/// at sign-in, rebuilt lazily when a still-valid token arrives after a
/// restart, and removed at sign-out.
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<Uuid, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: Uuid) -> Option<SessionEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }

    pub fn insert(&self, entry: SessionEntry) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.session.user_id, entry);
    }

    pub fn remove(&self, user_id: Uuid) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id);
    }
}

/// Axum extractor resolving `Authorization: Bearer` through the identity
/// provider. Authentication gates the whole flow: requests without a valid
/// session are rejected before any validation runs.
pub struct AuthSession(pub SessionEntry);

fn unauthorized(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
}

impl FromRequestParts<Arc<AppState>> for AuthSession {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_string)
            .ok_or_else(|| unauthorized("Authentication required"))?;

        let user = state.identity.get_user(&token).await.map_err(|e| {
            debug!("bearer token rejected by identity provider: {e}");
            unauthorized("Invalid or expired session")
        })?;

        if let Some(entry) = state.sessions.get(user.id) {
            entry.session.set_access_token(token);
            return Ok(AuthSession(entry));
        }

        // Valid token with no in-memory session, e.g. after a restart.
        // Rebuild the session from the profile store.
        let plan = match state.profiles.get_profile(&token, user.id).await {
            Ok(profile) => profile.plan,
            Err(e) => {
                warn!(user_id = %user.id, "profile unavailable, assuming free plan: {e}");
                PlanTier::default()
            }
        };
        let entry = state.build_session(user, token, plan);
        state.sessions.insert(entry.clone());
        Ok(AuthSession(entry))
    }
}
