#![allow(clippy::unused_async)]
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use kernel::{UploadReply, AVATAR_FIELD};
use tower_http::services::ServeDir;

use crate::config::GateConfig;
use crate::error::{failure, human_size, UploadError};
use crate::gate::{FilePart, StagedFile, UploadGate};

const UPLOAD_FORM: &str = include_str!("../templates/upload_form.html");

/// Renders the upload form
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "HTML upload form", content_type = "text/html", body = String),
    ),
    tag = "upload",
)]
pub async fn upload_form(State(gate): State<Arc<UploadGate>>) -> Html<String> {
    Html(render_form(gate.config()))
}

/// Accepts a single image plus any text fields from a multipart form.
#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = crate::openapi::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image stored, text fields echoed", body = UploadReply),
        (status = 400, description = "Malformed form or more than one file", body = kernel::ErrorReply),
        (status = 413, description = "Image exceeds the size ceiling", body = kernel::ErrorReply),
        (status = 415, description = "Image type is not allowed", body = kernel::ErrorReply),
        (status = 500, description = "Image could not be written", body = kernel::ErrorReply),
    ),
    tag = "upload",
)]
pub async fn upload(
    State(gate): State<Arc<UploadGate>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadReply>, UploadError> {
    gate.check_content_length(declared_length(&headers))?;
    let mut multipart = multipart?;

    let mut body = BTreeMap::new();
    let staged = receive(&gate, &mut multipart, &mut body).await?;
    let file = staged.map(StagedFile::commit).transpose()?;

    match &file {
        Some(f) => tracing::info!("upload accepted: {} fields: {}", f.file_name, body.len()),
        None => tracing::info!("form without file, fields: {}", body.len()),
    }
    Ok(Json(UploadReply { file, body }))
}

/// Reads every part. A staged file is dropped, and so deleted, on any error.
async fn receive(
    gate: &UploadGate,
    multipart: &mut Multipart,
    body: &mut BTreeMap<String, String>,
) -> Result<Option<StagedFile>, UploadError> {
    let max = gate.config().max_file_size;
    let mut staged: Option<StagedFile> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::from_multipart(&e, max))?
    {
        let name = field.name().unwrap_or(AVATAR_FIELD).to_owned();
        match field.file_name().map(ToOwned::to_owned) {
            // Browsers send an empty file part when nothing was picked
            Some(original_name) if original_name.is_empty() => continue,
            Some(original_name) => {
                if staged.is_some() {
                    return Err(UploadError::TooManyFiles);
                }
                let mime_type = field.content_type().map(ToOwned::to_owned);
                let part = FilePart {
                    field_name: &name,
                    original_name: &original_name,
                    mime_type: mime_type.as_deref(),
                };
                staged = Some(gate.stage(part, field).await?);
            }
            None => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| UploadError::from_multipart(&e, max))?;
                body.insert(name, value);
            }
        }
    }
    Ok(staged)
}

/// Serves files under the public root. I/O failures other than a missing or
/// unreadable file are answered by the global failure body.
pub async fn static_asset(mut assets: ServeDir, request: Request) -> Response {
    if is_hidden(request.uri().path()) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match assets.try_call(request).await {
        Ok(response) => response.map(Body::new),
        Err(e) => {
            tracing::error!("Failed to read static asset: {e}");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

fn is_hidden(path: &str) -> bool {
    path.split('/')
        .any(|s| s.starts_with('.') || s.to_ascii_lowercase().starts_with("%2e"))
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn render_form(config: &GateConfig) -> String {
    UPLOAD_FORM
        .replace("{{accept}}", &config.allowed_types.join(","))
        .replace("{{limit}}", &human_size(config.max_file_size))
}
