use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Subscription tier of a user. Upload size and monthly extraction limits are
/// pure functions of the tier and are never configurable per user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    #[default]
    Free,
    Premium,
}

impl PlanTier {
    /// Maximum accepted upload size in bytes (free: 1 MiB, premium: 5 MiB).
    pub fn max_upload_bytes(&self) -> u64 {
        match self {
            PlanTier::Free => 1_048_576,
            PlanTier::Premium => 5_242_880,
        }
    }

    /// Maximum number of extractions per calendar month.
    pub fn monthly_extraction_limit(&self) -> i64 {
        match self {
            PlanTier::Free => 10,
            PlanTier::Premium => 1_000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Premium => "premium",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file selected for extraction. Lives only for the duration of one
/// submission; never persisted by this service.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadCandidate {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Tagged result of one submission attempt. Never partially both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success { text: String },
    Failure { message: String },
}

/// One counter row per user per calendar month. The external store is the
/// source of truth; any copy held here is a session-local cache.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExtractionCounter {
    pub user_id: Uuid,
    /// Calendar month, 1-12.
    pub month: u32,
    /// 4-digit calendar year.
    pub year: i32,
    pub count: i64,
}

impl ExtractionCounter {
    /// Counter identity for the current calendar month of this user.
    pub fn current_period(user_id: Uuid, count: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            month: now.month(),
            year: now.year(),
            count,
        }
    }
}

/// Per-user profile row held by the external store.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub plan: PlanTier,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    pub user_id: Uuid,
    pub email: String,
    pub plan: PlanTier,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub email: String,
    pub plan: PlanTier,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub subscribed: bool,
    pub plan: PlanTier,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UsageResponse {
    pub month: u32,
    pub year: i32,
    pub count: i64,
    pub limit: i64,
    pub plan: PlanTier,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    /// Cosmetic, time-based indicator; not tied to bytes transferred.
    pub progress: u8,
}
