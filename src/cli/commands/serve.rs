//! HTTP API server.
//!
//! Serves transcripts at `GET /api/transcript/{videoId}` (and the query
//! variant `GET /api/transcript?videoId=`) plus a `GET /health` check.

use crate::cli::{preflight, Output};
use crate::config::Settings;
use crate::error::{FetchError, FetchErrorKind};
use crate::orchestrator::Orchestrator;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Shared application state.
pub struct AppState {
    orchestrator: Orchestrator,
    environment: String,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, environment: impl Into<String>) -> Self {
        Self {
            orchestrator,
            environment: environment.into(),
        }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, mut settings: Settings) -> anyhow::Result<()> {
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }

    preflight::check(&settings)?;
    let orchestrator = Orchestrator::new(&settings)?;
    let state = Arc::new(AppState::new(orchestrator, settings.server.environment.clone()));
    let app = build_router(state, &settings.server.allowed_origins);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        "Server running on {} (environment: {}, source: {})",
        addr, settings.server.environment, settings.source.kind
    );

    Output::header("ytscribe API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Transcript", "GET  /api/transcript/{videoId}");
    Output::kv("Transcript", "GET  /api/transcript?videoId=");
    Output::kv("Health", "GET  /health");
    Output::kv("Source", &settings.source.kind.to_string());
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router with CORS applied.
///
/// An empty `allowed_origins` list allows any origin.
pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route(
            "/api/transcript/{video_id}",
            get(transcript_by_path).options(preflight_ok),
        )
        .route(
            "/api/transcript",
            get(transcript_by_query).options(preflight_ok),
        )
        .route("/health", get(health))
        .fallback(not_found)
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let allow_origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct TranscriptQuery {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ErrorResponse {
    fn new(error: &'static str) -> Self {
        Self {
            error,
            message: None,
            details: None,
        }
    }

    fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    environment: String,
}

/// Map a fetch failure onto the status code and body callers see.
fn error_response(err: &FetchError) -> Response {
    let (status, body) = match err.kind {
        FetchErrorKind::InvalidInput => (
            StatusCode::BAD_REQUEST,
            ErrorResponse::new("Invalid video ID").details(&err.message),
        ),
        FetchErrorKind::NotAvailable => (
            StatusCode::NOT_FOUND,
            ErrorResponse::new("No transcript available")
                .message("This video does not have captions available")
                .details(&err.message),
        ),
        FetchErrorKind::UpstreamRateLimited => (
            StatusCode::TOO_MANY_REQUESTS,
            ErrorResponse::new("Rate limited by upstream")
                .message("YouTube is throttling transcript requests, try again later")
                .details(&err.message),
        ),
        FetchErrorKind::TransportFailure | FetchErrorKind::Timeout => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Failed to fetch transcript")
                .message(&err.message)
                .details("Internal server error"),
        ),
    };
    (status, Json(body)).into_response()
}

// === Handlers ===

async fn transcript_by_path(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Response {
    fetch(&state, &video_id).await
}

async fn transcript_by_query(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TranscriptQuery>,
) -> Response {
    match query.video_id.filter(|id| !id.is_empty()) {
        Some(video_id) => fetch(&state, &video_id).await,
        None => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing videoId parameter")),
        )
            .into_response(),
    }
}

async fn fetch(state: &AppState, video_id: &str) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("request", %request_id, video_id);

    async {
        info!("Fetching transcript");
        match state.orchestrator.fetch_transcript_str(video_id).await {
            Ok(transcript) => {
                info!("Returning {} segments", transcript.len());
                Json(transcript).into_response()
            }
            Err(e) => {
                warn!(kind = %e.kind, "Transcript request failed: {}", e.message);
                error_response(&e)
            }
        }
    }
    .instrument(span)
    .await
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
        environment: state.environment.clone(),
    })
}

async fn preflight_ok() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new("Not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caption_source::test_support::serve;
    use crate::caption_source::{CaptionSource, SourceKind};
    use crate::retry::RetryPolicy;
    use crate::transcript::{RawSegment, VideoId};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FixedSource {
        outcome: std::result::Result<Vec<RawSegment>, FetchError>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl CaptionSource for FixedSource {
        fn kind(&self) -> SourceKind {
            SourceKind::WatchPage
        }

        async fn retrieve(&self, _video_id: &VideoId) -> std::result::Result<Vec<RawSegment>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    async fn start(
        outcome: std::result::Result<Vec<RawSegment>, FetchError>,
        allowed_origins: &[String],
    ) -> (String, Arc<FixedSource>) {
        let source = Arc::new(FixedSource {
            outcome,
            calls: AtomicU32::new(0),
        });
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let orchestrator = Orchestrator::with_source(source.clone(), policy, Duration::from_secs(5));
        let state = Arc::new(AppState::new(orchestrator, "test"));
        (serve(build_router(state, allowed_origins)).await, source)
    }

    fn hello_world() -> Vec<RawSegment> {
        vec![
            RawSegment::new("Hello", Some(0.0), Some(2.0)),
            RawSegment::new("World", Some(2.0), Some(3.0)),
        ]
    }

    async fn get_json(url: &str) -> (StatusCode, Value) {
        let resp = reqwest::get(url).await.unwrap();
        let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn test_transcript_success() {
        let (base, _) = start(Ok(hello_world()), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript/dQw4w9WgXcQ", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!([
                {"text": "Hello", "start": 0.0, "duration": 2.0},
                {"text": "World", "start": 2.0, "duration": 3.0}
            ])
        );
    }

    #[tokio::test]
    async fn test_invalid_id_is_400_without_fetching() {
        let (base, source) = start(Ok(hello_world()), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript/abc", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid video ID");
        assert!(body["details"].as_str().unwrap().contains("11 characters"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_available_is_404() {
        let (base, _) = start(Err(FetchError::not_available("No captions found")), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript/dQw4w9WgXcQ", base)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No transcript available");
        assert_eq!(body["details"], "No captions found");
    }

    #[tokio::test]
    async fn test_empty_result_is_404() {
        let (base, source) = start(Ok(Vec::new()), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript/dQw4w9WgXcQ", base)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No transcript available");
        assert!(body["details"].as_str().unwrap().contains("dQw4w9WgXcQ"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_is_429() {
        let (base, _) = start(Err(FetchError::rate_limited("captcha")), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript/dQw4w9WgXcQ", base)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Rate limited by upstream");
        assert!(body["message"].is_string());
        assert_eq!(body["details"], "captcha");
    }

    #[tokio::test]
    async fn test_transport_failure_is_500() {
        let (base, _) = start(Err(FetchError::transport("connection reset")), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript/dQw4w9WgXcQ", base)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to fetch transcript");
        assert_eq!(body["message"], "connection reset");
        assert_eq!(body["details"], "Internal server error");
    }

    #[tokio::test]
    async fn test_timeout_is_500() {
        let (base, _) = start(Err(FetchError::timeout("Attempt exceeded 45s")), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript/dQw4w9WgXcQ", base)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to fetch transcript");
        assert_eq!(body["message"], "Attempt exceeded 45s");
        assert_eq!(body["details"], "Internal server error");
    }

    #[tokio::test]
    async fn test_query_variant() {
        let (base, _) = start(Ok(hello_world()), &[]).await;

        let (status, body) = get_json(&format!("{}/api/transcript?videoId=dQw4w9WgXcQ", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = get_json(&format!("{}/api/transcript", base)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing videoId parameter"}));
    }

    #[tokio::test]
    async fn test_health() {
        let (base, source) = start(Err(FetchError::transport("down")), &[]).await;

        let (status, body) = get_json(&format!("{}/health", base)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "test");
        assert!(chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (base, _) = start(Ok(hello_world()), &[]).await;

        let (status, body) = get_json(&format!("{}/nope", base)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Not found"}));
    }

    #[tokio::test]
    async fn test_preflight_returns_200_with_empty_body() {
        let (base, _) = start(Ok(hello_world()), &[]).await;

        let resp = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("{}/api/transcript/dQw4w9WgXcQ", base))
            .header("Origin", "https://example.com")
            .header("Access-Control-Request-Method", "GET")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        assert!(resp.text().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_allow_list_origins() {
        let allowed = vec!["https://app.example.com".to_string()];
        let (base, _) = start(Ok(hello_world()), &allowed).await;
        let client = reqwest::Client::new();
        let url = format!("{}/api/transcript/dQw4w9WgXcQ", base);

        let resp = client
            .get(&url)
            .header("Origin", "https://app.example.com")
            .send()
            .await
            .unwrap();
        assert_eq!(
            resp.headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("https://app.example.com")
        );

        let resp = client
            .get(&url)
            .header("Origin", "https://evil.example.com")
            .send()
            .await
            .unwrap();
        assert!(resp.headers().get("access-control-allow-origin").is_none());
    }
}
