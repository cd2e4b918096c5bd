use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShareError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Path is outside root directory")]
    PathTraversal,

    #[error("No file in upload")]
    MissingFile,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("File operation not allowed on directory")]
    NotAFile,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ShareError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ShareError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            // Escaping paths are indistinguishable from missing ones on the
            // wire so the response leaks nothing about the root's layout.
            ShareError::PathTraversal => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Not found".to_string(),
            ),
            ShareError::MissingFile => (StatusCode::BAD_REQUEST, "NO_FILE", self.to_string()),
            ShareError::InvalidFilename(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_FILENAME", self.to_string())
            }
            ShareError::FileTooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE", self.to_string())
            }
            ShareError::NotAFile => {
                (StatusCode::BAD_REQUEST, "NOT_A_FILE", self.to_string())
            }
            ShareError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", self.to_string()),
        };

        let body = ErrorResponse {
            error: message,
            code,
        };

        (status, Json(body)).into_response()
    }
}
