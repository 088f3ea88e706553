//! Session lifecycle management
//!
//! One [`SessionManager`] owns the messaging socket for the process: it
//! starts sessions from persisted credentials, turns socket events into
//! broadcast events, feeds inbound batches to the responder, and reconnects
//! after a fixed delay when the socket closes unexpectedly.
//!
//! The reconnect timer is an explicit scheduled task whose handle is
//! retained, so `logout` and `restart` cancel a pending attempt
//! deterministically. A generation counter makes close events from a
//! superseded socket inert, which is what an in-flight-restart flag would
//! otherwise guard.

pub mod creds;
pub mod rest;
pub mod socket;

pub use creds::CredsStore;
pub use rest::RestSocketFactory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::events::{
    ConnectionStatus, EventBus, GatewayEvent, MessagesPayload, StatusPayload, WireMessage,
};
use crate::responder::Responder;
use crate::{Error, Result};
use socket::{CloseReason, Socket, SocketEvent, SocketFactory};

/// Mutable connection state of the session
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Current lifecycle status
    pub status: ConnectionStatus,
    /// Pending QR payload, if pairing
    pub qr: Option<String>,
    /// Reason of the last close or startup failure
    pub last_error: Option<String>,
    /// Whether the socket is open
    pub connected: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::Starting,
            qr: None,
            last_error: None,
            connected: false,
        }
    }
}

/// Socket handle and background tasks, serialized behind one mutex
struct Inner {
    socket: Option<Arc<dyn Socket>>,
    event_task: Option<JoinHandle<()>>,
    reconnect_task: Option<JoinHandle<()>>,
    /// Bumped on every (re)start; close events carrying an older value are stale
    generation: u64,
}

/// Owns the messaging session and its lifecycle
pub struct SessionManager {
    instance_id: String,
    factory: Arc<dyn SocketFactory>,
    creds: CredsStore,
    bus: EventBus,
    responder: Arc<Responder>,
    reconnect_delay: Duration,
    state: RwLock<SessionState>,
    inner: Mutex<Inner>,
}

impl SessionManager {
    /// Create a manager
    #[must_use]
    pub fn new(
        instance_id: String,
        factory: Arc<dyn SocketFactory>,
        creds: CredsStore,
        bus: EventBus,
        responder: Arc<Responder>,
        reconnect_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            instance_id,
            factory,
            creds,
            bus,
            responder,
            reconnect_delay,
            state: RwLock::new(SessionState::default()),
            inner: Mutex::new(Inner {
                socket: None,
                event_task: None,
                reconnect_task: None,
                generation: 0,
            }),
        })
    }

    /// Current state snapshot
    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Current status payload, as broadcast to subscribers
    pub async fn status_payload(&self) -> StatusPayload {
        let state = self.state.read().await;
        StatusPayload {
            instance_id: self.instance_id.clone(),
            connection_status: state.status,
            whatsapp_connected: state.connected,
            has_qr: state.qr.is_some(),
            last_connection_error: state.last_error.clone(),
        }
    }

    /// Pending QR payload, if pairing
    pub async fn current_qr(&self) -> Option<String> {
        self.state.read().await.qr.clone()
    }

    /// Start a session from persisted credentials
    ///
    /// Startup failure is recorded as `error` status and broadcast, never
    /// returned.
    pub async fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock().await;
        self.start_locked(&mut inner).await;
    }

    /// Log out, invalidating the pairing and suppressing auto-reconnect
    ///
    /// The local session is torn down regardless of the outcome; persisted
    /// credentials are cleared only after a successful logout.
    ///
    /// # Errors
    ///
    /// Returns error if no session is active or the socket's logout fails.
    pub async fn logout(&self) -> Result<()> {
        let socket = {
            let mut inner = self.inner.lock().await;
            cancel_reconnect(&mut inner);
            // supersede the socket so its close event won't reconnect
            inner.generation += 1;
            if let Some(task) = inner.event_task.take() {
                task.abort();
            }
            inner.socket.take()
        };

        let result = match socket {
            Some(socket) => socket.logout().await,
            None => Err(Error::Session("no active session".to_string())),
        };

        {
            let mut state = self.state.write().await;
            state.status = ConnectionStatus::Disconnected;
            state.connected = false;
            state.qr = None;
            state.last_error = None;
        }
        self.publish_status().await;

        match result {
            Ok(()) => {
                tracing::info!("session logged out");
                self.creds.clear()?;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "logout failed");
                Err(e)
            }
        }
    }

    /// Force-close any existing session and start a fresh one
    ///
    /// A pending auto-reconnect is cancelled; close errors from the old
    /// socket are ignored. Failure of the fresh start leaves `error` status.
    pub async fn restart(self: &Arc<Self>) {
        tracing::info!("restarting session");
        let mut inner = self.inner.lock().await;
        cancel_reconnect(&mut inner);
        if let Some(task) = inner.event_task.take() {
            task.abort();
        }
        if let Some(socket) = inner.socket.take() {
            if let Err(e) = socket.close().await {
                tracing::debug!(error = %e, "ignoring close error during restart");
            }
        }
        self.start_locked(&mut inner).await;
    }

    /// Tear down without logging out (process shutdown)
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        cancel_reconnect(&mut inner);
        inner.generation += 1;
        if let Some(task) = inner.event_task.take() {
            task.abort();
        }
        if let Some(socket) = inner.socket.take() {
            if let Err(e) = socket.close().await {
                tracing::debug!(error = %e, "ignoring close error during shutdown");
            }
        }
    }

    /// Start a session while holding the lifecycle lock
    fn start_locked<'a>(
        self: &'a Arc<Self>,
        inner: &'a mut Inner,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
        cancel_reconnect(inner);
        if let Some(task) = inner.event_task.take() {
            task.abort();
        }
        inner.generation += 1;
        let generation = inner.generation;

        {
            let mut state = self.state.write().await;
            *state = SessionState::default();
        }
        self.publish_status().await;

        let creds = self.creds.load();
        let resuming = creds.is_some();

        match self.factory.connect(creds).await {
            Ok((socket, rx)) => {
                let socket: Arc<dyn Socket> = Arc::from(socket);
                inner.socket = Some(Arc::clone(&socket));
                inner.event_task = Some(tokio::spawn(Self::run_event_loop(
                    Arc::clone(self),
                    rx,
                    socket,
                    generation,
                )));
                tracing::info!(resuming, "session starting");
            }
            Err(e) => {
                tracing::error!(error = %e, "session start failed");
                {
                    let mut state = self.state.write().await;
                    state.status = ConnectionStatus::Error;
                    state.last_error = Some(e.to_string());
                    state.connected = false;
                }
                self.publish_status().await;
            }
        }
        })
    }

    /// Consume socket events until the socket closes
    async fn run_event_loop(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<SocketEvent>,
        socket: Arc<dyn Socket>,
        generation: u64,
    ) {
        while let Some(event) = rx.recv().await {
            match event {
                SocketEvent::CredsUpdate(creds) => {
                    if let Err(e) = self.creds.save(&creds) {
                        tracing::warn!(error = %e, "failed to persist credentials");
                    }
                }
                SocketEvent::Qr(qr) => {
                    {
                        let mut state = self.state.write().await;
                        state.status = ConnectionStatus::Qr;
                        state.qr = Some(qr.clone());
                        state.connected = false;
                    }
                    tracing::info!("QR code available for pairing");
                    self.bus.publish(GatewayEvent::Qr { qr });
                    self.publish_status().await;
                }
                SocketEvent::Open => {
                    {
                        let mut state = self.state.write().await;
                        state.status = ConnectionStatus::Connected;
                        state.connected = true;
                        state.qr = None;
                        state.last_error = None;
                    }
                    tracing::info!("session connected");
                    self.publish_status().await;
                }
                SocketEvent::Messages {
                    batch_type,
                    messages,
                } => {
                    self.bus.publish(GatewayEvent::Messages(MessagesPayload {
                        batch_type,
                        messages: messages.iter().map(WireMessage::from).collect(),
                    }));
                    self.responder.handle_batch(socket.as_ref(), &messages).await;
                }
                SocketEvent::Close(reason) => {
                    self.handle_close(reason, generation).await;
                    return;
                }
            }
        }
        tracing::debug!("socket event stream ended");
    }

    /// React to a socket close: record it and maybe schedule a reconnect
    async fn handle_close(self: &Arc<Self>, reason: CloseReason, generation: u64) {
        {
            let mut state = self.state.write().await;
            state.status = ConnectionStatus::Disconnected;
            state.connected = false;
            state.qr = None;
            state.last_error = Some(reason.message.clone());
        }
        self.publish_status().await;

        if reason.logged_out {
            tracing::info!(reason = %reason.message, "closed by logout, not reconnecting");
            if let Err(e) = self.creds.clear() {
                tracing::warn!(error = %e, "failed to clear credentials");
            }
            return;
        }

        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            // a restart or logout already superseded this socket
            return;
        }
        inner.socket = None;
        cancel_reconnect(&mut inner);

        let delay = self.reconnect_delay;
        tracing::warn!(
            reason = %reason.message,
            delay_ms = delay.as_millis(),
            "connection closed, reconnect scheduled"
        );
        let manager = Arc::clone(self);
        inner.reconnect_task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // release our own handle so start() doesn't abort us
            manager.inner.lock().await.reconnect_task = None;
            tracing::info!("attempting reconnect");
            manager.start().await;
        }));
    }

    async fn publish_status(&self) {
        let payload = self.status_payload().await;
        self.bus.publish(GatewayEvent::Status(payload));
    }
}

/// Abort a pending reconnect, if any
fn cancel_reconnect(inner: &mut Inner) {
    if let Some(task) = inner.reconnect_task.take() {
        task.abort();
        tracing::debug!("pending reconnect cancelled");
    }
}
