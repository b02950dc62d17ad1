use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{error_from_response, BackendError};
use crate::models::{ExtractionCounter, PlanTier, Profile};

/// Client for the relational profile store: per-user plan rows and the
/// per-user/month/year extraction counter rows. The store is the source of
/// truth for both; this service only reads and upserts.
#[derive(Clone)]
pub struct ProfileStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ProfileStore {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn get_profile(
        &self,
        access_token: &str,
        user_id: Uuid,
    ) -> Result<Profile, BackendError> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .query(&[
                ("id", format!("eq.{user_id}")),
                ("select", "plan,stripe_customer_id".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| BackendError::Payload(format!("profile rows: {e}")))?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Payload(format!("no profile row for user {user_id}")))
    }

    pub async fn update_plan(
        &self,
        access_token: &str,
        user_id: Uuid,
        plan: PlanTier,
    ) -> Result<(), BackendError> {
        let url = format!("{}/rest/v1/profiles", self.base_url);
        let response = self
            .http
            .patch(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .query(&[("id", format!("eq.{user_id}"))])
            .json(&serde_json::json!({ "plan": plan }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        debug!(%user_id, %plan, "profile plan updated");
        Ok(())
    }

    /// Read the counter row for one (user, month, year). A missing row means
    /// no extraction has happened that month yet and reads as zero.
    pub async fn get_extraction_count(
        &self,
        access_token: &str,
        user_id: Uuid,
        month: u32,
        year: i32,
    ) -> Result<i64, BackendError> {
        let url = format!("{}/rest/v1/extractions", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .query(&[
                ("user_id", format!("eq.{user_id}")),
                ("month", format!("eq.{month}")),
                ("year", format!("eq.{year}")),
                ("select", "count".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| BackendError::Payload(format!("counter rows: {e}")))?;
        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Upsert keyed by (user_id, month, year); conflict resolution is
    /// overwrite, so the caller sends the full new count.
    pub async fn upsert_extraction_count(
        &self,
        access_token: &str,
        counter: &ExtractionCounter,
    ) -> Result<(), BackendError> {
        let url = format!("{}/rest/v1/extractions", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .header("Prefer", "resolution=merge-duplicates")
            .bearer_auth(access_token)
            .json(counter)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        debug!(
            user_id = %counter.user_id,
            month = counter.month,
            year = counter.year,
            count = counter.count,
            "extraction counter upserted"
        );
        Ok(())
    }
}
