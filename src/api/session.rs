//! Session status and control endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use super::ApiState;
use crate::events::StatusPayload;

/// Build the public status router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .with_state(state)
}

/// Build the control router (wrapped in API key middleware by the caller)
pub fn control_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/session/logout", post(logout))
        .route("/session/restart", post(restart))
        .with_state(state)
}

/// Control endpoint payload
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Current session status
async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusPayload> {
    Json(state.session.status_payload().await)
}

/// Log the session out; auto-reconnect is suppressed
async fn logout(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ControlResponse>) {
    match state.session.logout().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ControlResponse {
                ok: true,
                error: None,
            }),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ControlResponse {
                ok: false,
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// Force-close and start a fresh session
async fn restart(State(state): State<Arc<ApiState>>) -> Json<ControlResponse> {
    state.session.restart().await;
    Json(ControlResponse {
        ok: true,
        error: None,
    })
}
