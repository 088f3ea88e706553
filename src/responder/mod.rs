//! Inbound message responder
//!
//! Filters inbound batches down to answerable direct messages and, when
//! auto-reply is configured, answers them through the completion API. A
//! failed completion is substituted with a fixed fallback reply; a failed
//! fallback send is logged and dropped.

pub mod completion;

pub use completion::CompletionClient;

use crate::config::AutoReplyConfig;
use crate::session::socket::{InboundMessage, Socket};

/// Answers inbound direct messages
pub struct Responder {
    completion: Option<CompletionClient>,
    fallback_reply: String,
}

impl Responder {
    /// Build a responder from configuration
    #[must_use]
    pub fn new(config: &AutoReplyConfig) -> Self {
        let completion = CompletionClient::from_config(config);
        if completion.is_some() {
            tracing::info!(model = %config.model, "auto-reply enabled");
        }
        Self {
            completion,
            fallback_reply: config.fallback_reply.clone(),
        }
    }

    /// Whether the responder will answer anything at all
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.completion.is_some()
    }

    /// Process one inbound batch
    ///
    /// Messages are answered sequentially in batch order.
    pub async fn handle_batch(&self, socket: &dyn Socket, messages: &[InboundMessage]) {
        let Some(completion) = &self.completion else {
            return;
        };

        for msg in messages {
            let Some(text) = answerable_text(msg) else {
                continue;
            };

            let reply = match completion.generate(text).await {
                Ok(generated) => generated,
                Err(e) => {
                    tracing::warn!(
                        jid = %msg.remote_jid,
                        error = %e,
                        "completion failed, sending fallback reply"
                    );
                    self.fallback_reply.clone()
                }
            };

            if let Err(e) = socket.send_text(&msg.remote_jid, &reply).await {
                tracing::error!(jid = %msg.remote_jid, error = %e, "reply send failed");
            }
        }
    }
}

/// Text body of a message the responder should answer
///
/// Skips self-sent messages, group conversations, and messages without a
/// non-empty text body.
#[must_use]
pub fn answerable_text(msg: &InboundMessage) -> Option<&str> {
    if msg.from_me || msg.is_group() {
        return None;
    }
    msg.text.as_deref().filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use secrecy::SecretString;

    use super::*;
    use crate::Result;

    fn dm(text: Option<&str>) -> InboundMessage {
        InboundMessage {
            id: "MSG1".to_string(),
            remote_jid: "15551234@s.whatsapp.net".to_string(),
            from_me: false,
            push_name: Some("Alice".to_string()),
            message_stub_type: None,
            text: text.map(ToString::to_string),
        }
    }

    #[test]
    fn answers_plain_dms_only() {
        assert_eq!(answerable_text(&dm(Some("hello"))), Some("hello"));

        let own = InboundMessage {
            from_me: true,
            ..dm(Some("hello"))
        };
        assert_eq!(answerable_text(&own), None);

        let group = InboundMessage {
            remote_jid: "12036@g.us".to_string(),
            ..dm(Some("hello"))
        };
        assert_eq!(answerable_text(&group), None);

        assert_eq!(answerable_text(&dm(None)), None);
        assert_eq!(answerable_text(&dm(Some("   "))), None);
    }

    /// Socket that records every sent message
    struct RecordingSocket {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSocket {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Socket for RecordingSocket {
        async fn send_text(&self, to: &str, text: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), text.to_string()));
            Ok(())
        }

        async fn logout(&self) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn inactive_responder_sends_nothing() {
        let responder = Responder::new(&AutoReplyConfig::default());
        let socket = RecordingSocket::new();

        responder.handle_batch(&socket, &[dm(Some("hello"))]).await;

        assert!(socket.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_failure_sends_fallback() {
        // nothing listens on this port, so every completion call fails
        let config = AutoReplyConfig {
            enabled: true,
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: Some(SecretString::from("sk-test")),
            fallback_reply: "try again later".to_string(),
            ..AutoReplyConfig::default()
        };
        let responder = Responder::new(&config);
        let socket = RecordingSocket::new();

        responder
            .handle_batch(
                &socket,
                &[
                    dm(Some("hello")),
                    InboundMessage {
                        from_me: true,
                        ..dm(Some("own message"))
                    },
                ],
            )
            .await;

        let sent = socket.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "15551234@s.whatsapp.net");
        assert_eq!(sent[0].1, "try again later");
    }
}
