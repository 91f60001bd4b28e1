//! Sheetwatch Server
//!
//! Run with: cargo run
//!
//! Environment variables:
//! - SHEETWATCH_HOST: Bind address (default: 0.0.0.0)
//! - SHEETWATCH_PORT: Port number (default: 8080)
//! - SHEETWATCH_UPLOAD_DIR: Directory holding uploaded workbooks (default: ./uploads)
//! - SHEETWATCH_GOOGLE_API_KEY: API key for link-shared Google Sheets
//! - SHEETWATCH_GOOGLE_ACCESS_TOKEN: OAuth token, used instead of the API key when set
//! - SHEETWATCH_HTTP_TIMEOUT_SECS: Per-request timeout for reads and webhooks (default: 10)
//! - SHEETWATCH_RETRY_BASE_MS: Delay after the first failed webhook attempt (default: 1000)
//! - RUST_LOG: Log level (default: info)

use sheetwatch::api::{run_server, ServerConfig};
use sheetwatch::sheets::GoogleAuth;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetwatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let defaults = ServerConfig::default();

    let google_auth = non_empty_env("SHEETWATCH_GOOGLE_ACCESS_TOKEN")
        .map(GoogleAuth::AccessToken)
        .or_else(|| non_empty_env("SHEETWATCH_GOOGLE_API_KEY").map(GoogleAuth::ApiKey));

    let config = ServerConfig {
        host: std::env::var("SHEETWATCH_HOST").unwrap_or(defaults.host),
        port: env_or("SHEETWATCH_PORT", defaults.port),
        upload_dir: non_empty_env("SHEETWATCH_UPLOAD_DIR")
            .map(Into::into)
            .unwrap_or(defaults.upload_dir),
        google_auth,
        http_timeout_secs: env_or("SHEETWATCH_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs).max(1),
        retry_base_ms: env_or("SHEETWATCH_RETRY_BASE_MS", defaults.retry_base_ms),
    };

    tracing::info!("Sheetwatch configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Upload directory: {}", config.upload_dir.display());
    tracing::info!("  HTTP timeout: {} seconds", config.http_timeout_secs);
    tracing::info!("  Webhook retry base delay: {} ms", config.retry_base_ms);
    match &config.google_auth {
        Some(GoogleAuth::AccessToken(_)) => tracing::info!("  Google Sheets: OAuth access token"),
        Some(GoogleAuth::ApiKey(_)) => tracing::info!("  Google Sheets: API key"),
        None => tracing::warn!("  Google Sheets: not configured (uploaded files only)"),
    }

    run_server(config).await
}
