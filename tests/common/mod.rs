//! Test utilities and common setup.

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tempfile::TempDir;

use lanshare::{routes, AppState, Config};

/// Create a test application serving a fresh temporary root.
///
/// The `TempDir` must stay alive for the duration of the test.
pub fn test_app() -> (Router, TempDir) {
    test_app_with_config(Config::default())
}

/// Create a test application with a custom config.
pub fn test_app_with_config(config: Config) -> (Router, TempDir) {
    let root = TempDir::new().unwrap();
    // Canonicalize so containment checks compare canonical prefixes
    // (macOS tempdirs live behind a /var -> /private/var symlink).
    let root_dir = root.path().canonicalize().unwrap();

    let state = AppState::with_config(root_dir, config);
    let app = Router::new()
        .merge(routes::api_routes())
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .with_state(state);

    (app, root)
}

/// Build a minimal multipart/form-data body with a single field.
pub fn multipart_body(boundary: &str, field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/plain\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}
