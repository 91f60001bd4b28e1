use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    get_job, health_check, list_jobs, start_job, stop_all_jobs, stop_job, test_webhook,
    validate_webhook, AppState,
};
use crate::monitor::JobRegistry;
use crate::notify::{HttpTransport, RetryPolicy};
use crate::sheets::{DataSourceRouter, GoogleAuth, GoogleSheetsReader, WorkbookReader};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub google_auth: Option<GoogleAuth>,
    pub http_timeout_secs: u64,
    pub retry_base_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            upload_dir: PathBuf::from("./uploads"),
            google_auth: None,
            http_timeout_secs: 10,
            retry_base_ms: 1000,
        }
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Monitoring jobs
        .route("/monitoring/start", post(start_job))
        .route("/monitoring/jobs", get(list_jobs))
        .route("/monitoring/jobs/:job_id", get(get_job))
        .route("/monitoring/stop/:job_id", post(stop_job))
        .route("/monitoring/stop-all", post(stop_all_jobs))
        // Webhooks
        .route("/webhook/validate", post(validate_webhook))
        .route("/webhook/test", post(test_webhook))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Build the job registry with the configured data sources and webhook transport
pub fn build_registry(config: &ServerConfig) -> Result<JobRegistry, Box<dyn std::error::Error>> {
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let google = config
        .google_auth
        .clone()
        .map(|auth| GoogleSheetsReader::new(auth, timeout))
        .transpose()?;
    let reader = DataSourceRouter::new(google, WorkbookReader::new(&config.upload_dir));
    let transport = HttpTransport::new(timeout)?;

    Ok(JobRegistry::new(Arc::new(reader), Arc::new(transport))
        .with_retry_policy(RetryPolicy::new(Duration::from_millis(config.retry_base_ms))))
}

/// Run the HTTP server
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(build_registry(&config)?);

    let state = Arc::new(AppState {
        registry: Arc::clone(&registry),
    });

    // Build router
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting Sheetwatch server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&registry)))
        .await?;

    tracing::info!("Sheetwatch server stopped");
    Ok(())
}

async fn shutdown_signal(registry: Arc<JobRegistry>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for CTRL+C");
        return;
    }

    tracing::info!("Shutdown signal received, stopping monitoring jobs...");
    let stopped = registry.stop_all();
    tracing::info!(stopped, "Monitoring jobs stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{ScriptedReader, WEBHOOK};
    use crate::notify::testing::RecordingTransport;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn create_test_app() -> (Router, Arc<RecordingTransport>) {
        let reader = Arc::new(ScriptedReader::new(vec![Some(vec![("A1", "1")])]));
        let transport = Arc::new(RecordingTransport::new());
        let registry = Arc::new(JobRegistry::new(reader, transport.clone()));
        let state = Arc::new(AppState { registry });
        (build_router(state), transport)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn start_body() -> serde_json::Value {
        serde_json::json!({
            "dataSourceId": "1AbCdEf",
            "range": "Sheet1!A1:B5",
            "conditions": [
                {"id": "c1", "cell": "A1", "operator": "changed", "value": "", "description": "Status changed"}
            ],
            "webhookUrl": WEBHOOK,
            "frequencyMinutes": 5
        })
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_list_and_stop() {
        let (app, _) = create_test_app();

        let response = app
            .clone()
            .oneshot(post_json("/monitoring/start", start_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job_id = body_json(response).await["jobId"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/monitoring/jobs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let jobs = body_json(response).await;
        assert_eq!(jobs.as_array().unwrap().len(), 1);
        assert_eq!(jobs[0]["jobId"], job_id.as_str());
        assert_eq!(jobs[0]["status"], "running");
        assert_eq!(jobs[0]["frequencyMinutes"], 5);

        let uri = format!("/monitoring/stop/{}", job_id);
        let response = app
            .clone()
            .oneshot(post_json(&uri, serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);

        let response = app
            .oneshot(post_json(&uri, serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_validation_error() {
        let (app, _) = create_test_app();

        let mut body = start_body();
        body["webhookUrl"] = serde_json::json!("https://example.com/webhook");

        let response = app
            .oneshot(post_json("/monitoring/start", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("webhookUrl"));
    }

    #[tokio::test]
    async fn test_get_unknown_job() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/monitoring/jobs/job_missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_stop_all_with_no_jobs() {
        let (app, _) = create_test_app();

        let response = app
            .oneshot(post_json("/monitoring/stop-all", serde_json::json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["stopped"], 0);
    }

    #[tokio::test]
    async fn test_webhook_validate_and_test() {
        let (app, transport) = create_test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/webhook/validate",
                serde_json::json!({ "webhookUrl": "https://hooks.slack.com/invalid/path" }),
            ))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["valid"], false);

        let response = app
            .oneshot(post_json(
                "/webhook/test",
                serde_json::json!({ "webhookUrl": WEBHOOK }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["success"], true);
        assert_eq!(transport.calls(), 1);
    }
}
