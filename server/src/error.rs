use std::any::Any;

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kernel::{ErrorReply, Failure};

/// Reasons an upload is refused or fails.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Only .jpg, jpeg or .png format allowed!")]
    UnsupportedMediaType,

    #[error("File size is too large. Please upload files below {limit}!")]
    PayloadTooLarge { limit: String },

    #[error("Only one file per request is allowed!")]
    TooManyFiles,

    #[error("Malformed upload: {0}")]
    BadRequest(String),

    #[error("Failed to store file")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    #[must_use]
    pub fn too_large(max_file_size: u64) -> Self {
        Self::PayloadTooLarge {
            limit: human_size(max_file_size),
        }
    }

    /// Maps a multipart parsing failure. Body limit violations keep their
    /// meaning so they are reported as oversized uploads.
    #[must_use]
    pub fn from_multipart(e: &MultipartError, max_file_size: u64) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::too_large(max_file_size)
        } else {
            Self::BadRequest(e.body_text())
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::TooManyFiles | UploadError::BadRequest(_) => StatusCode::BAD_REQUEST,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartRejection> for UploadError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let UploadError::Io(e) = &self {
            tracing::error!("upload failed: {self}. Error: {e}");
        } else {
            tracing::warn!("upload rejected: {self}");
        }
        (status, Json(ErrorReply::avatar(self.to_string()))).into_response()
    }
}

/// Builds the `{ message, status }` body used for failures outside the upload route.
pub fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Failure {
        message: message.into(),
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

/// Global handler for anything that panicked while serving a request.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_owned()
    } else {
        String::from("unknown panic")
    };
    tracing::error!("Unhandled error: {details}");
    failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

pub(crate) fn human_size(bytes: u64) -> String {
    const MB: u64 = 1_000_000;
    const KB: u64 = 1_000;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{bytes} bytes")
    }
}
