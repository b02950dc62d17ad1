use reqwest::multipart;
use serde_json::Value;
use tracing::debug;

use crate::models::UploadCandidate;

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Transport(#[source] reqwest::Error),
    #[error("OCR service returned a body that was not valid JSON")]
    InvalidBody(#[source] reqwest::Error),
}

/// Sends a validated file to the external OCR webhook. One POST, no retry,
/// no explicit timeout; the call resolves with a body (any HTTP status) or
/// fails with a transport error. The body is returned as loosely-typed JSON
/// and interpretation is left to the normalizer.
#[derive(Clone)]
pub struct SubmissionClient {
    http: reqwest::Client,
    webhook_url: String,
}

impl SubmissionClient {
    pub fn new(http: reqwest::Client, webhook_url: &str) -> Self {
        Self {
            http,
            webhook_url: webhook_url.to_string(),
        }
    }

    pub async fn submit(&self, candidate: &UploadCandidate) -> Result<Value, SubmissionError> {
        let part = multipart::Part::bytes(candidate.data.clone())
            .file_name(candidate.filename.clone())
            .mime_str(&candidate.content_type)
            .map_err(SubmissionError::Transport)?;
        let form = multipart::Form::new().part("file", part);

        debug!(
            filename = %candidate.filename,
            bytes = candidate.size(),
            "submitting file to OCR webhook"
        );
        let response = self
            .http
            .post(&self.webhook_url)
            .multipart(form)
            .send()
            .await
            .map_err(SubmissionError::Transport)?;

        // Any HTTP status counts as a resolved response; only a malformed
        // body is an error here.
        response
            .json::<Value>()
            .await
            .map_err(SubmissionError::InvalidBody)
    }
}
