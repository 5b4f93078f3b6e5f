use axum::Json;
use kernel::{ErrorReply, FieldError, FieldErrors, Failure, StoredFile, UploadReply};
use utoipa::{OpenApi, ToSchema};

use crate::handlers;

/// Multipart body accepted by `POST /upload`. Any other text field is echoed too.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// JPEG or PNG image
    #[schema(value_type = String, format = Binary)]
    avatar: Vec<u8>,
    caption: Option<String>,
}

#[derive(OpenApi)]
#[openapi(
    paths(handlers::upload_form, handlers::upload),
    components(schemas(
        UploadForm,
        UploadReply,
        StoredFile,
        ErrorReply,
        FieldErrors,
        FieldError,
        Failure
    )),
    tags((name = "upload", description = "Single image upload"))
)]
pub struct ApiDoc;

pub async fn serve() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
