//! WA-Bridge - WhatsApp connection bridge with media upload endpoints
//!
//! This library provides the core functionality for the bridge:
//! - Session lifecycle management (QR pairing, reconnect, logout/restart)
//! - Auto-reply to inbound direct messages via a completion API
//! - Single-shot and chunked media upload endpoints
//! - Event broadcasting to connected clients
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Clients                          │
//! │   WebSocket  │  /upload  │  /upload/chunk  │  ...   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   WA-Bridge                          │
//! │   Session  │  Responder  │  Media Store  │  Events  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │      Multi-device protocol library (sidecar)         │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod events;
pub mod media;
pub mod responder;
pub mod session;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use events::{ConnectionStatus, EventBus, GatewayEvent, StatusPayload};
pub use media::{AssetKind, MediaStore, StoredAsset};
pub use responder::Responder;
pub use session::{CredsStore, SessionManager, SessionState};
