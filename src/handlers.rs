use std::cmp::Ordering;
use std::convert::Infallible;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info, warn};

use crate::error::ShareError;
use crate::AppState;

/// One entry in a directory listing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    /// Path relative to the root, `/`-separated
    pub path: String,
}

/// Response for the flat file listing endpoint
#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<FileEntry>,
}

/// Response for the browse endpoint: a directory listing or file details
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BrowseResponse {
    Directory {
        path: String,
        entries: Vec<FileEntry>,
    },
    File {
        name: String,
        path: String,
        size: u64,
        /// Seconds since the Unix epoch, when available
        modified: Option<u64>,
        mime: String,
    },
}

/// Response for a successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(rename = "fileName")]
    pub file_name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// One clipboard sync message, both the POST body and the SSE event payload
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncMessage {
    pub content: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub root: String,
}

// ============================================================================
// Helper functions
// ============================================================================

/// Sanitize an uploaded filename down to a single safe path component.
/// Returns None if nothing usable remains.
fn sanitize_filename(filename: &str) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    // Strip control characters, then neutralize separators and shell-hostile
    // characters.
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    // Leading/trailing dots or spaces hide extensions and break Windows
    // clients pulling the file back down.
    let sanitized = sanitized.trim_matches(|c| c == '.' || c == ' ');

    if sanitized.is_empty() {
        return None;
    }

    if sanitized.len() > 255 {
        // Cap at 255 bytes without splitting a multi-byte character
        let mut idx = 255;
        while !sanitized.is_char_boundary(idx) {
            idx -= 1;
        }
        return Some(sanitized[..idx].to_string());
    }

    Some(sanitized.to_string())
}

/// Resolve a relative path against the root, rejecting any traversal attempt.
///
/// The path is rebuilt component-by-component: `..`, absolute components, and
/// embedded NUL bytes are rejected outright rather than resolved, so the
/// result is within the root by construction. Callers touching existing paths
/// should still canonicalize afterwards to catch symlink escapes.
fn resolve_path(root: &Path, relative: &str) -> Result<PathBuf, ShareError> {
    let relative = relative.trim_start_matches('/');

    if relative.is_empty() || relative == "." {
        return Ok(root.to_path_buf());
    }

    let mut result = root.to_path_buf();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => {
                if name.to_string_lossy().contains('\0') {
                    warn!("path component contains NUL byte: {:?}", name);
                    return Err(ShareError::PathTraversal);
                }
                result.push(name);
            }
            Component::ParentDir => {
                // Rejected even when it would still resolve inside the root.
                warn!("path traversal attempt: parent directory in {:?}", relative);
                return Err(ShareError::PathTraversal);
            }
            Component::CurDir => continue,
            Component::RootDir | Component::Prefix(_) => {
                warn!("absolute component in relative path {:?}", relative);
                return Err(ShareError::PathTraversal);
            }
        }
    }

    if !result.starts_with(root) {
        error!("resolved path escaped root: {:?}", result);
        return Err(ShareError::PathTraversal);
    }

    Ok(result)
}

/// Resolve a path and, when it exists, canonicalize it to verify symlinks do
/// not lead outside the root.
fn resolve_and_verify_path(root: &Path, relative: &str) -> Result<PathBuf, ShareError> {
    let built_path = resolve_path(root, relative)?;

    if built_path.exists() {
        let canonical_root = root.canonicalize()?;
        let canonical_path = built_path.canonicalize()?;

        if !canonical_path.starts_with(&canonical_root) {
            warn!(
                "symlink escape: {:?} resolved to {:?} outside {:?}",
                built_path, canonical_path, canonical_root
            );
            return Err(ShareError::PathTraversal);
        }

        return Ok(canonical_path);
    }

    Ok(built_path)
}

/// Relative path from root, always `/`-separated.
fn get_relative_path(root: &Path, full_path: &Path) -> String {
    let Ok(relative) = full_path.strip_prefix(root) else {
        return String::new();
    };

    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            parts.push(part.to_string_lossy().to_string());
        }
    }

    parts.join("/")
}

fn modified_secs(metadata: &std::fs::Metadata) -> Option<u64> {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
}

/// List one directory level, filtering OS junk names.
async fn list_dir(state: &AppState, dir: &Path) -> Result<Vec<FileEntry>, ShareError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if state.config.is_hidden_name(&name) {
            continue;
        }

        let metadata = entry.metadata().await?;
        files.push(FileEntry {
            is_directory: metadata.is_dir(),
            size: metadata.len(),
            path: get_relative_path(&state.root_dir, &entry.path()),
            name,
        });
    }

    // Directories first, then case-insensitive by name
    files.sort_by(|a, b| match (a.is_directory, b.is_directory) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });

    Ok(files)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        root: state.root_dir.display().to_string(),
    })
}

/// GET /api/files - Flat listing of the root directory
pub async fn list_files(State(state): State<AppState>) -> Result<Json<ListResponse>, ShareError> {
    let files = list_dir(&state, &state.root_dir).await.map_err(|e| {
        error!("failed to list root directory: {}", e);
        e
    })?;
    Ok(Json(ListResponse { files }))
}

/// GET /api/browse - Browse the root directory
pub async fn browse_root(state: State<AppState>) -> Result<Json<BrowseResponse>, ShareError> {
    browse(state, axum::extract::Path(String::new())).await
}

/// GET /api/browse/{*path} - Browse a nested path under the root
///
/// Returns a directory listing or file details. Paths that escape the root
/// come back as the same 404 a missing path produces.
pub async fn browse(
    State(state): State<AppState>,
    axum::extract::Path(rel): axum::extract::Path<String>,
) -> Result<Json<BrowseResponse>, ShareError> {
    let path = resolve_and_verify_path(&state.root_dir, &rel)?;

    if !path.exists() {
        return Err(ShareError::NotFound(rel));
    }

    if path.is_dir() {
        let entries = list_dir(&state, &path).await?;
        return Ok(Json(BrowseResponse::Directory {
            path: get_relative_path(&state.root_dir, &path),
            entries,
        }));
    }

    let metadata = fs::metadata(&path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let mime = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    Ok(Json(BrowseResponse::File {
        name,
        path: get_relative_path(&state.root_dir, &path),
        size: metadata.len(),
        modified: modified_secs(&metadata),
        mime,
    }))
}

/// GET /api/raw/{*path} - Stream a file's bytes
///
/// Streams rather than buffering so large drops do not sit in memory.
pub async fn raw_file(
    State(state): State<AppState>,
    axum::extract::Path(rel): axum::extract::Path<String>,
) -> Result<Response, ShareError> {
    let path = resolve_and_verify_path(&state.root_dir, &rel)?;

    if !path.exists() {
        return Err(ShareError::NotFound(rel));
    }

    if path.is_dir() {
        return Err(ShareError::NotAFile);
    }

    debug!("streaming file: {}", path.display());

    let metadata = fs::metadata(&path).await?;
    let file = fs::File::open(&path).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mime = mime_guess::from_path(&path)
        .first_or_octet_stream()
        .to_string();

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let safe_filename = file_name.replace('"', "'");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"{}\"", safe_filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// POST /api/upload - Accept a multipart upload into the root directory
///
/// Expects a form field named `file`; the submitted filename is sanitized to
/// a single path component before anything touches the disk.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ShareError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("multipart error: {}", e);
        ShareError::Io(std::io::Error::other(e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let raw_filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "upload".to_string());

        let file_name = sanitize_filename(&raw_filename).ok_or_else(|| {
            warn!("rejected invalid filename: {:?}", raw_filename);
            ShareError::InvalidFilename(raw_filename.clone())
        })?;

        let declared_type = field.content_type().map(|s| s.to_string());

        let data = field.bytes().await.map_err(|e| {
            error!("failed to read upload data: {}", e);
            ShareError::Io(std::io::Error::other(e))
        })?;

        // Check the size before anything is written
        if data.len() as u64 > state.config.max_upload_size {
            return Err(ShareError::FileTooLarge {
                size: data.len() as u64,
                limit: state.config.max_upload_size,
            });
        }

        let dest_path = state.root_dir.join(&file_name);

        info!("uploading file: {} ({} bytes)", dest_path.display(), data.len());

        let mut file = fs::File::create(&dest_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        let content_type = declared_type.unwrap_or_else(|| {
            mime_guess::from_path(&dest_path)
                .first_or_octet_stream()
                .to_string()
        });

        return Ok(Json(UploadResponse {
            success: true,
            file_name,
            size: data.len() as u64,
            content_type,
        }));
    }

    Err(ShareError::MissingFile)
}

/// GET /api/sync - Subscribe to clipboard updates over SSE
///
/// The first event carries the current content; one event follows per
/// accepted update for the life of the connection. When the client goes
/// away the subscription is dropped with the body stream, which unregisters
/// it from the hub.
pub async fn sync_stream(State(state): State<AppState>) -> Result<Response, ShareError> {
    let subscription = state.sync.subscribe();

    let stream = subscription.map(|content| {
        let payload = serde_json::to_string(&SyncMessage { content }).unwrap_or_default();
        Ok::<_, Infallible>(Bytes::from(format!("data: {payload}\n\n")))
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no") // Disable nginx buffering if present
        .body(Body::from_stream(stream))
        .map_err(|e| ShareError::Io(std::io::Error::other(e)))
}

/// POST /api/sync - Replace the clipboard content and broadcast it
pub async fn sync_update(
    State(state): State<AppState>,
    Json(update): Json<SyncMessage>,
) -> &'static str {
    debug!("clipboard update ({} bytes)", update.content.len());
    state.sync.publish(update.content);
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_path_accepts_nested_paths() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolve_path(root, "docs/report.pdf").unwrap(),
            PathBuf::from("/srv/uploads/docs/report.pdf")
        );
        assert_eq!(resolve_path(root, "").unwrap(), root);
        assert_eq!(resolve_path(root, ".").unwrap(), root);
        assert_eq!(
            resolve_path(root, "./a/./b").unwrap(),
            PathBuf::from("/srv/uploads/a/b")
        );
    }

    #[test]
    fn resolve_path_rejects_traversal() {
        let root = Path::new("/srv/uploads");
        assert!(matches!(
            resolve_path(root, "../../etc/passwd"),
            Err(ShareError::PathTraversal)
        ));
        assert!(matches!(
            resolve_path(root, "docs/../../escape"),
            Err(ShareError::PathTraversal)
        ));
        // Parent references are rejected even when they stay inside the root
        assert!(matches!(
            resolve_path(root, "docs/../other"),
            Err(ShareError::PathTraversal)
        ));
    }

    #[test]
    fn resolve_path_strips_leading_slash() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            resolve_path(root, "/docs/a.txt").unwrap(),
            PathBuf::from("/srv/uploads/docs/a.txt")
        );
    }

    #[cfg(unix)]
    #[test]
    fn resolve_and_verify_path_rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();

        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "top secret").unwrap();
        std::os::unix::fs::symlink(&secret, root.path().join("link.txt")).unwrap();

        assert!(matches!(
            resolve_and_verify_path(root.path(), "link.txt"),
            Err(ShareError::PathTraversal)
        ));
    }

    #[test]
    fn sanitize_filename_neutralizes_separators() {
        assert_eq!(
            sanitize_filename("../../etc/passwd").unwrap(),
            "_.._etc_passwd"
        );
        assert_eq!(sanitize_filename("a\\b:c").unwrap(), "a_b_c");
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn sanitize_filename_truncates_long_names_at_char_boundaries() {
        // 300 two-byte characters; a fixed byte cut would land mid-character
        let long = "é".repeat(300);
        let sanitized = sanitize_filename(&long).unwrap();
        assert!(sanitized.len() <= 255);
        // 255 is not a boundary for two-byte characters, so we back off to 254
        assert_eq!(sanitized.len(), 254);
        assert!(sanitized.chars().all(|c| c == 'é'));

        // ASCII names cut cleanly at the cap
        let long_ascii = "a".repeat(300);
        assert_eq!(sanitize_filename(&long_ascii).unwrap().len(), 255);
    }

    #[test]
    fn sanitize_filename_rejects_empty_results() {
        assert!(sanitize_filename("").is_none());
        assert!(sanitize_filename("...").is_none());
        assert!(sanitize_filename("  ").is_none());
        assert!(sanitize_filename("\u{0}\u{1}").is_none());
    }

    #[test]
    fn relative_paths_use_forward_slashes() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            get_relative_path(root, Path::new("/srv/uploads/a/b.txt")),
            "a/b.txt"
        );
        assert_eq!(get_relative_path(root, root), "");
        // Paths outside the root yield nothing rather than leaking structure
        assert_eq!(get_relative_path(root, Path::new("/etc/passwd")), "");
    }
}
