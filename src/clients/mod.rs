/*!
 * HTTP clients for the external collaborators: identity provider, profile /
 * extraction-counter store and payment checkout. These systems are consumed
 * at their HTTP interface only; nothing here reimplements their behavior.
 */

pub mod billing;
pub mod identity;
pub mod profiles;

use reqwest::StatusCode;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("unexpected backend payload: {0}")]
    Payload(String),
}

/// Build an `Api` error from a non-success response, probing the usual error
/// message keys the backend uses across its auth, rest and function surfaces.
pub(crate) async fn error_from_response(response: reqwest::Response) -> BackendError {
    let status = response.status();
    let message = match response.json::<Value>().await {
        Ok(body) => ["error_description", "message", "msg", "error", "hint"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| body.to_string()),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    BackendError::Api { status, message }
}
