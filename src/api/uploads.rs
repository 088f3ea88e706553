//! Single-shot asset upload endpoint
//!
//! `POST /upload?instance=<id>` with multipart fields `csrf_token` and
//! `asset_file`. The token is checked in constant time before anything
//! touches the filesystem. Every failure path answers a typed JSON payload;
//! nothing propagates past the request boundary.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};

use super::{ApiState, auth::token_matches};
use crate::media::AssetKind;

/// Build upload router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .with_state(state)
}

/// Query parameters accepted by the upload endpoints
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Instance identifier baked into the stored filename
    pub instance: Option<String>,
}

/// Upload result payload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One received file field
struct ReceivedFile {
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

/// Handle a single-shot asset upload
async fn upload(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, UploadError> {
    let (csrf_token, file) = read_form(multipart).await?;

    verify_token(&state, csrf_token.as_deref())?;

    let file = file.ok_or(UploadError::BadRequest("missing file field `asset_file`"))?;

    let kind = file
        .content_type
        .as_deref()
        .and_then(AssetKind::from_mime)
        .ok_or(UploadError::Unsupported)?;

    let instance = query.instance.unwrap_or_else(|| state.instance_id.clone());

    let asset = state
        .store
        .save_asset(kind, &instance, file.filename.as_deref(), &file.data)
        .map_err(|e| UploadError::Storage(e.to_string()))?;

    Ok(Json(UploadResponse {
        error: false,
        message: "file uploaded".to_string(),
        code: Some(asset.code),
        url: Some(asset.url),
        path: Some(asset.path),
    }))
}

/// Read the multipart form into (token, file)
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Option<String>, Option<ReceivedFile>), UploadError> {
    let mut csrf_token = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| UploadError::BadRequest("malformed multipart body"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csrf_token" => {
                csrf_token = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| UploadError::BadRequest("unreadable csrf_token"))?,
                );
            }
            "asset_file" => {
                let filename = field.file_name().map(ToString::to_string);
                let content_type = field.content_type().map(ToString::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| UploadError::BadRequest("unreadable file field"))?;
                file = Some(ReceivedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok((csrf_token, file))
}

/// Check the upload token before any filesystem mutation
pub(super) fn verify_token(state: &ApiState, provided: Option<&str>) -> Result<(), UploadError> {
    let Some(expected) = &state.upload_token else {
        return Err(UploadError::Forbidden("uploads are not configured"));
    };
    match provided {
        Some(token) if token_matches(expected, token) => Ok(()),
        Some(_) => Err(UploadError::Forbidden("invalid csrf token")),
        None => Err(UploadError::Forbidden("missing csrf token")),
    }
}

/// Upload failure classes
#[derive(Debug)]
pub enum UploadError {
    /// Token missing or mismatched
    Forbidden(&'static str),
    /// Malformed request
    BadRequest(&'static str),
    /// MIME type outside image/video/audio
    Unsupported,
    /// Storage failure
    Storage(String),
}

impl UploadError {
    fn parts(self) -> (StatusCode, String) {
        match self {
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::Unsupported => (
                StatusCode::BAD_REQUEST,
                "unsupported file type (expected image, video, or audio)".to_string(),
            ),
            Self::Storage(msg) => {
                tracing::error!(error = %msg, "upload storage failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failed".to_string())
            }
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();
        (
            status,
            Json(UploadResponse {
                error: true,
                message,
                code: None,
                url: None,
                path: None,
            }),
        )
            .into_response()
    }
}
