//! Socket seam for the external multi-device messaging library
//!
//! The encrypted WhatsApp protocol is an external collaborator. The bridge
//! talks to it through the [`Socket`] trait and a stream of [`SocketEvent`]s,
//! so the session manager never depends on a concrete transport. The bundled
//! [`super::rest::RestSocketFactory`] adapts a sidecar HTTP gateway; tests
//! script their own factories.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// Suffix of group conversation JIDs
pub const GROUP_JID_SUFFIX: &str = "@g.us";

/// One inbound message delivered by the socket
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Message identifier
    pub id: String,

    /// Conversation JID (`<number>@s.whatsapp.net` or `<id>@g.us`)
    pub remote_jid: String,

    /// Whether the message was sent by this session
    pub from_me: bool,

    /// Sender display name
    pub push_name: Option<String>,

    /// Protocol stub type for non-content messages
    pub message_stub_type: Option<u32>,

    /// Text body, if the message carries one
    pub text: Option<String>,
}

impl InboundMessage {
    /// Whether the message belongs to a group conversation
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.remote_jid.ends_with(GROUP_JID_SUFFIX)
    }
}

/// Why a socket closed
#[derive(Debug, Clone)]
pub struct CloseReason {
    /// Human-readable close reason
    pub message: String,

    /// Whether the close was caused by the account being logged out
    pub logged_out: bool,
}

/// Lifecycle and message events emitted by a socket
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// Updated pairing credentials to persist
    CredsUpdate(serde_json::Value),

    /// New QR payload for device linking
    Qr(String),

    /// Socket is open and authenticated
    Open,

    /// Socket closed
    Close(CloseReason),

    /// Inbound message batch
    Messages {
        /// Batch type reported by the transport (e.g. `"notify"`)
        batch_type: String,
        /// Messages in the batch
        messages: Vec<InboundMessage>,
    },
}

/// Handle to a live messaging socket
#[async_trait]
pub trait Socket: Send + Sync {
    /// Send a text message to a JID
    ///
    /// # Errors
    ///
    /// Returns error if the transport rejects or fails to deliver the send.
    async fn send_text(&self, to: &str, text: &str) -> Result<()>;

    /// Log the account out, invalidating the pairing
    ///
    /// # Errors
    ///
    /// Returns error if the logout can't be performed.
    async fn logout(&self) -> Result<()>;

    /// Close the socket without logging out
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails to close cleanly.
    async fn close(&self) -> Result<()>;
}

/// Creates sockets for the session manager
///
/// A fresh socket (and event receiver) is produced on every start and
/// restart, optionally resuming from persisted credentials.
#[async_trait]
pub trait SocketFactory: Send + Sync {
    /// Open a new socket
    ///
    /// # Errors
    ///
    /// Returns error if the underlying transport can't be reached.
    async fn connect(
        &self,
        creds: Option<serde_json::Value>,
    ) -> Result<(Box<dyn Socket>, mpsc::Receiver<SocketEvent>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_jid_detection() {
        let group = InboundMessage {
            id: "A".to_string(),
            remote_jid: "1203634@g.us".to_string(),
            from_me: false,
            push_name: None,
            message_stub_type: None,
            text: Some("hi".to_string()),
        };
        assert!(group.is_group());

        let dm = InboundMessage {
            remote_jid: "15551234@s.whatsapp.net".to_string(),
            ..group
        };
        assert!(!dm.is_group());
    }
}
