use anyhow::{anyhow, Result};
use url::Url;

/// Default OCR webhook used when OCR_WEBHOOK_URL is not set.
pub const DEFAULT_OCR_WEBHOOK_URL: &str =
    "https://louisetest.app.n8n.cloud/webhook-test/Image2Text";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    /// Base URL of the backend-as-a-service hosting identity, profile rows
    /// and edge functions. Consumed, never reimplemented.
    pub backend_base_url: String,
    pub backend_api_key: String,
    /// External OCR webhook the uploaded file is forwarded to.
    pub ocr_webhook_url: String,
    pub frontend_path: String,
    /// Comma-separated list of allowed origins; unset means permissive CORS.
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let server_address =
            std::env::var("SERVER_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".to_string());

        let backend_base_url = std::env::var("BACKEND_BASE_URL")
            .map_err(|_| anyhow!("BACKEND_BASE_URL must be set"))?;
        let backend_base_url = validate_http_url("BACKEND_BASE_URL", &backend_base_url)?
            .trim_end_matches('/')
            .to_string();

        let backend_api_key = std::env::var("BACKEND_API_KEY")
            .map_err(|_| anyhow!("BACKEND_API_KEY must be set"))?;

        let ocr_webhook_url = std::env::var("OCR_WEBHOOK_URL")
            .unwrap_or_else(|_| DEFAULT_OCR_WEBHOOK_URL.to_string());
        let ocr_webhook_url = validate_http_url("OCR_WEBHOOK_URL", &ocr_webhook_url)?;

        let frontend_path =
            std::env::var("FRONTEND_PATH").unwrap_or_else(|_| "./frontend/dist".to_string());

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Config {
            server_address,
            backend_base_url,
            backend_api_key,
            ocr_webhook_url,
            frontend_path,
            cors_allowed_origins,
        })
    }
}

fn validate_http_url(name: &str, value: &str) -> Result<String> {
    let parsed =
        Url::parse(value).map_err(|e| anyhow!("Invalid {} URL format: {} ({})", name, value, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(anyhow!(
            "Invalid {} URL format: {} (expected http or https)",
            name,
            value
        ));
    }
    Ok(value.to_string())
}
