use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{error_from_response, BackendError};

/// Client for the external identity provider. Credential and token handling
/// live entirely on the provider side; this client only passes calls through.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
}

/// Result of a successful password sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInSession {
    pub access_token: String,
    pub user: AuthenticatedUser,
}

impl IdentityClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInSession, BackendError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let session: SignInSession = response
            .json()
            .await
            .map_err(|e| BackendError::Payload(format!("sign-in response: {e}")))?;
        debug!(user_id = %session.user.id, "identity provider accepted sign-in");
        Ok(session)
    }

    /// Registration leaves the account pending email confirmation; the
    /// provider owns the confirmation flow.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), BackendError> {
        let url = format!("{}/auth/v1/signup", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let url = format!("{}/auth/v1/logout", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(())
    }

    pub async fn get_user(&self, access_token: &str) -> Result<AuthenticatedUser, BackendError> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| BackendError::Payload(format!("user response: {e}")))
    }

    /// Server-side "active subscription" check. The function answers 200 with
    /// `subscribed: false` on its own internal errors, so the body is probed
    /// leniently.
    pub async fn check_subscription(&self, access_token: &str) -> Result<bool, BackendError> {
        let url = format!("{}/functions/v1/check-subscription", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Payload(format!("subscription response: {e}")))?;
        Ok(body
            .get("subscribed")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}
