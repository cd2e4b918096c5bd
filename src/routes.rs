use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::AppState;

/// Create application routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Shared clipboard: SSE subscription + updates on one path
        .route(
            "/api/sync",
            get(handlers::sync_stream).post(handlers::sync_update),
        )
        // File listing and uploads
        .route("/api/files", get(handlers::list_files))
        .route("/api/upload", post(handlers::upload_file))
        // Browse nested paths
        .route("/api/browse", get(handlers::browse_root))
        .route("/api/browse/{*path}", get(handlers::browse))
        // Raw file bytes
        .route("/api/raw/{*path}", get(handlers::raw_file))
}
