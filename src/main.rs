use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use decryptimage::{app_router, config::Config, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "starting decryptimage on {} (OCR webhook: {})",
        config.server_address,
        config.ocr_webhook_url
    );

    let server_address = config.server_address.clone();
    let state = Arc::new(AppState::new(config));
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
