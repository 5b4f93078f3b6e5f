#![warn(clippy::unwrap_in_result)]
#![warn(clippy::unwrap_used)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart field name the upload form uses for the image.
pub const AVATAR_FIELD: &str = "avatar";

/// Describes an image accepted by the server and written to disk.
///
/// Field names on the wire follow the descriptor most multipart
/// middlewares produce, so existing front ends can consume it as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredFile {
    /// Form field the file was sent under
    #[serde(rename = "fieldname")]
    pub field_name: String,
    /// File name as supplied by the client (untrusted)
    #[serde(rename = "originalname")]
    pub original_name: String,
    /// Declared MIME type, always one of the allowed image types
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    /// Directory the file was written into
    pub destination: String,
    /// Generated storage name inside `destination`
    #[serde(rename = "filename")]
    pub file_name: String,
    /// `destination` joined with `filename`
    pub path: String,
    /// Size of the stored file in bytes as measured while writing
    pub size: u64,
}

/// Successful reply of the upload endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UploadReply {
    /// Stored image or `null` when the form carried no file part
    pub file: Option<StoredFile>,
    /// Non-file form fields, echoed unchanged
    pub body: BTreeMap<String, String>,
}

/// Validation failure reply: `{ "errors": { "avatar": { "msg": "..." } } }`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorReply {
    pub errors: FieldErrors,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FieldErrors {
    pub avatar: FieldError,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub msg: String,
}

impl ErrorReply {
    #[must_use]
    pub fn avatar(msg: impl Into<String>) -> Self {
        Self {
            errors: FieldErrors {
                avatar: FieldError { msg: msg.into() },
            },
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.errors.avatar.msg
    }
}

/// Generic failure produced by the global error handler.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Failure {
    /// Human readable description
    pub message: String,
    /// HTTP status code that was sent with this body
    pub status: u16,
}
