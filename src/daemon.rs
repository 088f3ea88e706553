//! Daemon - the running bridge
//!
//! Wires configuration into the session manager, responder, media store, and
//! HTTP API, then runs until interrupted.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::api::{ApiServer, ApiState};
use crate::config::Config;
use crate::events::EventBus;
use crate::media::MediaStore;
use crate::responder::Responder;
use crate::session::socket::{Socket, SocketEvent, SocketFactory};
use crate::session::{CredsStore, RestSocketFactory, SessionManager};
use crate::{Error, Result};

/// The bridge daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a daemon from loaded configuration
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if storage directories can't be created or the API
    /// server fails to bind.
    pub async fn run(self) -> Result<()> {
        let config = self.config;

        let bus = EventBus::new();
        let store = MediaStore::new(
            config.uploads_dir.clone(),
            config.chunk_tmp_dir(),
            config.public_base_url.clone(),
        );
        store.ensure_dirs()?;
        tracing::info!(uploads = %config.uploads_dir.display(), "media store ready");

        let responder = Arc::new(Responder::new(&config.auto_reply));
        if !responder.is_active() {
            tracing::info!("auto-reply disabled");
        }

        let factory: Arc<dyn SocketFactory> = match &config.session.gateway_url {
            Some(url) => {
                tracing::info!(url = %url, session = %config.session.session_name, "socket gateway configured");
                Arc::new(RestSocketFactory::new(
                    url.clone(),
                    config.session.session_name.clone(),
                    config.session.poll_interval,
                ))
            }
            None => {
                tracing::warn!("no socket gateway configured - running in upload-only mode");
                Arc::new(DisabledSocketFactory)
            }
        };

        let session = SessionManager::new(
            config.instance_id.clone(),
            factory,
            CredsStore::new(config.creds_path()),
            bus.clone(),
            responder,
            config.session.reconnect_delay,
        );
        session.start().await;

        if config.upload_token.is_none() {
            tracing::warn!("no upload token configured - upload endpoints will reject requests");
        }

        let state = Arc::new(ApiState {
            instance_id: config.instance_id,
            session: Arc::clone(&session),
            bus,
            store,
            upload_token: config.upload_token,
            api_key: config.api_key,
        });
        let server = ApiServer::new(state, config.port);

        tokio::select! {
            result = server.serve() => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                session.shutdown().await;
                Ok(())
            }
        }
    }
}

/// Placeholder factory used when no gateway is configured
///
/// Keeps the session surface alive; `start` records an `error` status that
/// subscribers see on the broadcast channel.
struct DisabledSocketFactory;

#[async_trait]
impl SocketFactory for DisabledSocketFactory {
    async fn connect(
        &self,
        _creds: Option<serde_json::Value>,
    ) -> Result<(Box<dyn Socket>, mpsc::Receiver<SocketEvent>)> {
        Err(Error::Socket("no socket gateway configured".to_string()))
    }
}
