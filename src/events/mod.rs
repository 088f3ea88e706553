//! Gateway event broadcasting
//!
//! Lifecycle, QR, and message events flow through an explicit
//! publish/subscribe bus. Subscribers (WebSocket clients) register with
//! [`EventBus::subscribe`]; publishing is best-effort: a bus with no
//! subscribers drops events silently, and a lagging subscriber loses the
//! oldest events rather than blocking the publisher.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::session::socket::InboundMessage;

/// Buffered events per subscriber before lag kicks in
const BUS_CAPACITY: usize = 64;

/// Connection status of the messaging session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Session is starting up
    Starting,
    /// Waiting for QR pairing
    Qr,
    /// Socket is open
    Connected,
    /// Socket is closed
    Disconnected,
    /// Startup failed
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Qr => write!(f, "qr"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Status payload broadcast on every lifecycle transition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    /// Instance identifier
    pub instance_id: String,
    /// Current connection status
    pub connection_status: ConnectionStatus,
    /// Whether the socket is open
    pub whatsapp_connected: bool,
    /// Whether a QR payload is pending
    #[serde(rename = "hasQR")]
    pub has_qr: bool,
    /// Reason of the last close or startup failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_connection_error: Option<String>,
}

/// Message batch payload
#[derive(Debug, Clone, Serialize)]
pub struct MessagesPayload {
    /// Batch type reported by the socket (e.g. `"notify"`)
    #[serde(rename = "type")]
    pub batch_type: String,
    /// Messages in the batch
    pub messages: Vec<WireMessage>,
}

/// One inbound message as broadcast to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Message key
    pub key: WireMessageKey,
    /// Sender display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    /// Whether the message was sent by this session
    pub from_me: bool,
    /// Conversation JID
    pub remote_jid: String,
    /// Protocol stub type for non-content messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_stub_type: Option<u32>,
}

/// Key identifying a message within a conversation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessageKey {
    /// Message identifier
    pub id: String,
    /// Conversation JID
    pub remote_jid: String,
    /// Whether the message was sent by this session
    pub from_me: bool,
}

impl From<&InboundMessage> for WireMessage {
    fn from(msg: &InboundMessage) -> Self {
        Self {
            key: WireMessageKey {
                id: msg.id.clone(),
                remote_jid: msg.remote_jid.clone(),
                from_me: msg.from_me,
            },
            push_name: msg.push_name.clone(),
            from_me: msg.from_me,
            remote_jid: msg.remote_jid.clone(),
            message_stub_type: msg.message_stub_type,
        }
    }
}

/// An event broadcast to connected clients
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum GatewayEvent {
    /// New QR payload is available for pairing
    Qr {
        /// QR payload to render client-side
        qr: String,
    },
    /// Connection status changed
    Status(StatusPayload),
    /// Inbound message batch arrived
    Messages(MessagesPayload),
}

/// Publish/subscribe bus for [`GatewayEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    /// Create a new bus
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Register a subscriber
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers (best-effort)
    pub fn publish(&self, event: GatewayEvent) {
        // send only fails when there are no subscribers
        if self.tx.send(event).is_err() {
            tracing::trace!("event published with no subscribers");
        }
    }

    /// Number of active subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
