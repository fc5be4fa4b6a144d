//! Router configuration for the upload server.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{serve_site_file, serve_site_root, summary, upload, AppState};

/// Create the main router.
///
/// `max_upload_size` bounds the whole request body in bytes.
pub fn create_router(app_state: Arc<AppState>, max_upload_size: usize) -> Router {
    let api_routes = Router::new()
        .route("/upload", post(upload))
        .route("/summary.json", get(summary));

    let site_routes = Router::new()
        .route("/:site/", get(serve_site_root))
        .route("/:site/*path", get(serve_site_file));

    Router::new()
        .nest("/api", api_routes)
        .nest("/p", site_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_health_router() {
        let _router = create_health_router();
        // Should not panic
    }

    #[test]
    fn test_create_router() {
        let dir = tempfile::tempdir().unwrap();
        let storage = crate::site::SiteStorage::new(dir.path()).unwrap();
        let state = Arc::new(AppState::new(
            storage,
            crate::admission::ExtensionPolicy::deny(["exe"]),
        ));
        let _router = create_router(state, 1024 * 1024);
    }
}
