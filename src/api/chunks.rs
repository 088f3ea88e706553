//! Chunked upload endpoint
//!
//! `POST /upload/chunk?instance=<id>` once per chunk, with multipart fields
//! `csrf_token`, `upload_id`, `chunk_index` (0-based), `total_chunks`,
//! optional `file_name`/`file_type`, and the binary `chunk`. Non-final
//! chunks are acknowledged; the final chunk triggers verification,
//! in-order reassembly, and scratch cleanup.
//!
//! Concurrent duplicate final-chunk submissions for the same upload id are
//! not synchronized; last writer wins on the assembled file.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::uploads::UploadQuery;
use super::{ApiState, auth::token_matches};
use crate::media::{AssetKind, sniff_kind};

/// Build chunked upload router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/upload/chunk", post(upload_chunk))
        .with_state(state)
}

/// Chunk endpoint payload
#[derive(Debug, Default, Serialize)]
pub struct ChunkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Parsed multipart form of one chunk request
#[derive(Debug, Default)]
struct ChunkForm {
    csrf_token: Option<String>,
    upload_id: Option<String>,
    chunk_index: Option<String>,
    total_chunks: Option<String>,
    file_name: Option<String>,
    file_type: Option<String>,
    chunk: Option<Bytes>,
}

/// Handle one chunk of a multi-request upload
async fn upload_chunk(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<ChunkResponse>, ChunkError> {
    let form = read_form(multipart).await?;

    verify_token(&state, form.csrf_token.as_deref())?;

    let upload_id = form
        .upload_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ChunkError::BadRequest("missing upload_id".to_string()))?;

    let index: u32 = form
        .chunk_index
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ChunkError::BadRequest("invalid chunk_index".to_string()))?;

    let total: u32 = form
        .total_chunks
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .filter(|t| *t > 0)
        .ok_or_else(|| ChunkError::BadRequest("invalid total_chunks".to_string()))?;

    if index >= total {
        return Err(ChunkError::BadRequest("chunk_index out of range".to_string()));
    }

    let chunk = form
        .chunk
        .as_ref()
        .ok_or_else(|| ChunkError::BadRequest("missing chunk field".to_string()))?;

    state
        .store
        .save_chunk(upload_id, index, chunk)
        .map_err(|e| ChunkError::Storage(e.to_string()))?;

    // Intermediate chunks are acknowledged only
    if index + 1 < total {
        return Ok(Json(ChunkResponse {
            ok: true,
            received: Some(index),
            ..ChunkResponse::default()
        }));
    }

    // Final chunk: classify, verify, assemble
    let kind = form
        .file_type
        .as_deref()
        .and_then(AssetKind::from_mime)
        .or_else(|| sniff_kind(chunk));

    let Some(kind) = kind else {
        state.store.discard_transfer(upload_id);
        return Err(ChunkError::Unsupported);
    };

    let instance = query.instance.unwrap_or_else(|| state.instance_id.clone());

    let asset = state
        .store
        .assemble(upload_id, total, kind, &instance, form.file_name.as_deref())
        .map_err(|e| {
            state.store.discard_transfer(upload_id);
            match e {
                crate::Error::Media(msg) => ChunkError::BadRequest(msg),
                other => ChunkError::Storage(other.to_string()),
            }
        })?;

    Ok(Json(ChunkResponse {
        ok: true,
        code: Some(asset.code),
        url: Some(asset.url),
        path: Some(asset.path),
        ..ChunkResponse::default()
    }))
}

/// Read the multipart form
async fn read_form(mut multipart: Multipart) -> Result<ChunkForm, ChunkError> {
    let mut form = ChunkForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ChunkError::BadRequest("malformed multipart body".to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "chunk" => {
                form.chunk = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|_| ChunkError::BadRequest("unreadable chunk field".to_string()))?,
                );
            }
            "csrf_token" | "upload_id" | "chunk_index" | "total_chunks" | "file_name"
            | "file_type" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ChunkError::BadRequest("unreadable form field".to_string()))?;
                match name.as_str() {
                    "csrf_token" => form.csrf_token = Some(value),
                    "upload_id" => form.upload_id = Some(value),
                    "chunk_index" => form.chunk_index = Some(value),
                    "total_chunks" => form.total_chunks = Some(value),
                    "file_name" => form.file_name = Some(value),
                    _ => form.file_type = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Check the upload token before any filesystem mutation
fn verify_token(state: &ApiState, provided: Option<&str>) -> Result<(), ChunkError> {
    let Some(expected) = &state.upload_token else {
        return Err(ChunkError::Forbidden("uploads are not configured"));
    };
    match provided {
        Some(token) if token_matches(expected, token) => Ok(()),
        Some(_) => Err(ChunkError::Forbidden("invalid csrf token")),
        None => Err(ChunkError::Forbidden("missing csrf token")),
    }
}

/// Chunk upload failure classes
#[derive(Debug)]
pub enum ChunkError {
    /// Token missing or mismatched
    Forbidden(&'static str),
    /// Malformed request
    BadRequest(String),
    /// No usable category from declared type or content
    Unsupported,
    /// Storage failure
    Storage(String),
}

impl ChunkError {
    fn parts(self) -> (StatusCode, String) {
        match self {
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unsupported => (
                StatusCode::BAD_REQUEST,
                "unsupported file type (expected image, video, or audio)".to_string(),
            ),
            Self::Storage(msg) => {
                tracing::error!(error = %msg, "chunk storage failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "storage failed".to_string())
            }
        }
    }
}

impl IntoResponse for ChunkError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();
        (
            status,
            Json(ChunkResponse {
                ok: false,
                error: Some(message),
                ..ChunkResponse::default()
            }),
        )
            .into_response()
    }
}
