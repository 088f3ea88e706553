//! HTTP API server for the bridge

pub mod auth;
pub mod chunks;
pub mod health;
pub mod session;
pub mod uploads;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::events::EventBus;
use crate::media::MediaStore;
use crate::session::SessionManager;

/// Upper bound for upload request bodies (single chunk or single file)
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Instance identifier used in asset filenames and status events
    pub instance_id: String,
    /// Session manager driving the messaging socket
    pub session: Arc<SessionManager>,
    /// Event bus WebSocket subscribers attach to
    pub bus: EventBus,
    /// Asset storage
    pub store: MediaStore,
    /// Token required by the upload endpoints; uploads rejected when unset
    pub upload_token: Option<String>,
    /// Bearer key guarding the session control endpoints
    pub api_key: Option<String>,
}

/// Build the full application router
pub fn router(state: Arc<ApiState>) -> Router {
    let control = session::control_router(Arc::clone(&state)).layer(
        middleware::from_fn_with_state(Arc::clone(&state), auth::require_api_key),
    );

    Router::new()
        .merge(health::router())
        .merge(session::router(Arc::clone(&state)))
        .merge(websocket::router(Arc::clone(&state)))
        .merge(uploads::router(Arc::clone(&state)))
        .merge(chunks::router(Arc::clone(&state)))
        .merge(control)
        .nest_service("/uploads", ServeDir::new(state.store.uploads_dir()))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    /// Create a server
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Bind and serve until the process shuts down
    ///
    /// # Errors
    ///
    /// Returns error if binding or serving fails.
    pub async fn serve(self) -> Result<()> {
        let app = router(self.state);
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "API server listening");
        axum::serve(listener, app).await?;
        Ok(())
    }
}
