use serde_json::Value;

use super::{error_from_response, BackendError};

/// Outcome of asking the payment provider for a checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// Redirect the user to the provider's hosted checkout page.
    Redirect { url: String },
    /// The provider found an active subscription and created nothing.
    AlreadySubscribed { message: String },
}

/// Client for the checkout edge function. Payment processing itself is the
/// provider's concern.
#[derive(Clone)]
pub struct BillingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BillingClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub async fn create_checkout(
        &self,
        access_token: &str,
    ) -> Result<CheckoutOutcome, BackendError> {
        let url = format!("{}/functions/v1/create-checkout", self.base_url);
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
            .map_err(|e| BackendError::Payload(format!("checkout response: {e}")))?;

        if let Some(url) = body.get("url").and_then(Value::as_str) {
            return Ok(CheckoutOutcome::Redirect {
                url: url.to_string(),
            });
        }
        if let Some(message) = body.get("message").and_then(Value::as_str) {
            return Ok(CheckoutOutcome::AlreadySubscribed {
                message: message.to_string(),
            });
        }
        Err(BackendError::Payload(format!(
            "checkout response had neither url nor message: {body}"
        )))
    }
}
