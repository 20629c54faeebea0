use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::FeedConfig;
use crate::ingest::{self, types::FeedProvider, types::FetchMode};
use crate::preview::render_preview;

pub const NO_EVENTS_MESSAGE: &str =
    "There have been no earthquakes of magnitude 2.5+ in the contiguous United States within the last day.";
pub const FAVICON_URL: &str = "https://earthquake.usgs.gov/favicon.ico";
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://www.threads.net";

const ALLOWED_ORIGIN_SUFFIXES: [&str; 4] = [
    ".threads.net",
    ".instagram.com",
    ".facebook.com",
    ".distal-labs.workers.dev",
];

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn FeedProvider>,
    pub feed: Arc<FeedConfig>,
    /// Present when a Prometheus recorder was installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(provider: Arc<dyn FeedProvider>, feed: FeedConfig) -> Self {
        Self {
            provider,
            feed: Arc::new(feed),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET])
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(false)
        .max_age(Duration::from_secs(600));

    Router::new()
        .route("/", get(latest_preview))
        .route("/health", get(|| async { (StatusCode::OK, "OK") }))
        .route("/favicon.ico", get(favicon))
        .route("/metrics", get(metrics_text))
        .fallback(not_found)
        .layer(cors)
        .layer(middleware::from_fn(pin_allowed_origin))
        .layer(CatchPanicLayer::custom(panic_to_response))
        .with_state(state)
}

/// Origin echoed back to the browser: the caller's own origin when it belongs to
/// one of the permitted domains, otherwise the fixed default.
pub fn resolve_allowed_origin(origin: &str) -> &str {
    let lower = origin.to_ascii_lowercase();
    if ALLOWED_ORIGIN_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        origin
    } else {
        DEFAULT_ALLOWED_ORIGIN
    }
}

// Runs outside the CORS layer and overrides whatever origin it mirrored.
async fn pin_allowed_origin(req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut resp = next.run(req).await;
    let allowed = HeaderValue::from_str(resolve_allowed_origin(&origin))
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_ALLOWED_ORIGIN));
    resp.headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
    resp
}

async fn latest_preview(State(state): State<AppState>) -> Response {
    let notices =
        ingest::fetch_notices(state.provider.as_ref(), FetchMode::OnDemand, &state.feed).await;
    match notices.first() {
        Some(notice) => Html(render_preview(notice)).into_response(),
        None => NO_EVENTS_MESSAGE.into_response(),
    }
}

async fn favicon() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, FAVICON_URL)]).into_response()
}

async fn metrics_text(State(state): State<AppState>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(ApiError::NotFound)
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

fn panic_to_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Internal(detail).into_response()
}

/// Errors surfaced by the HTTP layer as `{"message": ...}` JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not Found")]
    NotFound,
    #[error("{message}")]
    Status { status: StatusCode, message: String },
    #[error("Error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Status { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match status {
            // Auth noise stays at debug
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!(status = status.as_u16(), %message, "auth rejected");
            }
            s if s.is_server_error() => {
                tracing::error!(status = s.as_u16(), %message, "request failed");
            }
            s => {
                tracing::debug!(status = s.as_u16(), %message, "request rejected");
            }
        }
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permitted_suffixes_echo_origin_case_insensitively() {
        assert_eq!(
            resolve_allowed_origin("https://WWW.Threads.NET"),
            "https://WWW.Threads.NET"
        );
        assert_eq!(
            resolve_allowed_origin("https://bot.distal-labs.workers.dev"),
            "https://bot.distal-labs.workers.dev"
        );
        assert_eq!(
            resolve_allowed_origin("https://evil-facebook.com.example"),
            DEFAULT_ALLOWED_ORIGIN
        );
        assert_eq!(resolve_allowed_origin(""), DEFAULT_ALLOWED_ORIGIN);
    }

    #[test]
    fn error_statuses_and_messages() {
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::NotFound.to_string(), "Not Found");
        let forbidden = ApiError::Status {
            status: StatusCode::FORBIDDEN,
            message: "nope".into(),
        };
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.to_string(), "nope");
        assert_eq!(ApiError::Internal("boom".into()).to_string(), "Error: boom");
    }

    #[test]
    fn panics_map_to_json_500() {
        let resp = panic_to_response(Box::new("kaboom"));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
