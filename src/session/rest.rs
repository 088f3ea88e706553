//! Sidecar socket adapter
//!
//! Drives a WhatsApp HTTP gateway sidecar (a WAHA-style REST service that
//! embeds the multi-device protocol library) and adapts its session states
//! to [`SocketEvent`]s. The bridge never touches the encrypted protocol
//! itself.
//!
//! REST surface used:
//! - `POST /api/sessions/{name}/start`
//! - `GET  /api/sessions/{name}` → `{status, qr?, reason?}`
//! - `GET  /api/sessions/{name}/messages` → drained inbound batch
//! - `POST /api/sessions/{name}/send` with `{chatId, text}`
//! - `POST /api/sessions/{name}/logout`
//! - `POST /api/sessions/{name}/stop`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::socket::{CloseReason, InboundMessage, Socket, SocketEvent, SocketFactory};
use crate::{Error, Result};

/// Buffered events before the poller blocks
const EVENT_BUFFER: usize = 100;

/// Session status reported by the sidecar
#[derive(Debug, Deserialize)]
struct SessionStatus {
    status: String,
    qr: Option<String>,
    reason: Option<String>,
}

/// One inbound message as reported by the sidecar
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewayMessage {
    id: String,
    chat_id: String,
    from_me: bool,
    push_name: Option<String>,
    body: Option<String>,
    stub_type: Option<u32>,
}

impl From<GatewayMessage> for InboundMessage {
    fn from(msg: GatewayMessage) -> Self {
        Self {
            id: msg.id,
            remote_jid: msg.chat_id,
            from_me: msg.from_me,
            push_name: msg.push_name,
            message_stub_type: msg.stub_type,
            text: msg.body,
        }
    }
}

/// Map a sidecar session status to a close event, if it is terminal
fn close_for_status(status: &str, reason: Option<&str>) -> Option<CloseReason> {
    match status {
        "LOGGED_OUT" => Some(CloseReason {
            message: reason.unwrap_or("logged out").to_string(),
            logged_out: true,
        }),
        "STOPPED" | "FAILED" => Some(CloseReason {
            message: reason.unwrap_or("connection closed").to_string(),
            logged_out: false,
        }),
        _ => None,
    }
}

/// Socket factory backed by a sidecar HTTP gateway
pub struct RestSocketFactory {
    base_url: String,
    session_name: String,
    poll_interval: Duration,
    client: Client,
}

impl RestSocketFactory {
    /// Create a factory
    ///
    /// # Arguments
    ///
    /// * `base_url` - Sidecar base URL (e.g., `http://localhost:3000`)
    /// * `session_name` - Session name registered with the sidecar
    /// * `poll_interval` - How often to poll status and messages
    #[must_use]
    pub fn new(base_url: String, session_name: String, poll_interval: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_name,
            poll_interval,
            client: Client::new(),
        }
    }

    fn session_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/sessions/{}{suffix}",
            self.base_url, self.session_name
        )
    }
}

#[async_trait]
impl SocketFactory for RestSocketFactory {
    async fn connect(
        &self,
        _creds: Option<serde_json::Value>,
    ) -> Result<(Box<dyn Socket>, mpsc::Receiver<SocketEvent>)> {
        // The sidecar owns the pairing credentials; persisted creds are
        // ignored here and kept only for in-process socket implementations.
        let response = self
            .client
            .post(self.session_url("/start"))
            .send()
            .await
            .map_err(|e| Error::Socket(format!("gateway unreachable: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Socket(format!(
                "gateway start failed: {status} - {body}"
            )));
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let poll_task = spawn_poller(
            self.client.clone(),
            self.session_url(""),
            self.session_url("/messages"),
            self.poll_interval,
            tx,
        );

        let socket = RestSocket {
            client: self.client.clone(),
            send_url: self.session_url("/send"),
            logout_url: self.session_url("/logout"),
            stop_url: self.session_url("/stop"),
            poll_task,
        };

        Ok((Box::new(socket), rx))
    }
}

/// Poll the sidecar and translate its state into socket events
fn spawn_poller(
    client: Client,
    status_url: String,
    messages_url: String,
    interval: Duration,
    tx: mpsc::Sender<SocketEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_qr: Option<String> = None;
        let mut open = false;

        loop {
            tokio::time::sleep(interval).await;

            let status: SessionStatus = match fetch_json(&client, &status_url).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "gateway status poll failed");
                    continue;
                }
            };

            if let Some(reason) = close_for_status(&status.status, status.reason.as_deref()) {
                let _ = tx.send(SocketEvent::Close(reason)).await;
                return;
            }

            if let Some(qr) = status.qr {
                if last_qr.as_ref() != Some(&qr) {
                    last_qr = Some(qr.clone());
                    if tx.send(SocketEvent::Qr(qr)).await.is_err() {
                        return;
                    }
                }
            }

            if status.status == "WORKING" {
                if !open {
                    open = true;
                    last_qr = None;
                    if tx.send(SocketEvent::Open).await.is_err() {
                        return;
                    }
                }

                match fetch_json::<Vec<GatewayMessage>>(&client, &messages_url).await {
                    Ok(messages) if !messages.is_empty() => {
                        tracing::debug!(count = messages.len(), "gateway messages received");
                        let batch = SocketEvent::Messages {
                            batch_type: "notify".to_string(),
                            messages: messages.into_iter().map(Into::into).collect(),
                        };
                        if tx.send(batch).await.is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "gateway message poll failed");
                    }
                }
            }
        }
    })
}

/// GET a JSON document from the sidecar
async fn fetch_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Socket(format!("gateway request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::Socket(format!(
            "gateway answered {}",
            response.status()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Socket(format!("invalid gateway response: {e}")))
}

/// Live socket backed by the sidecar
struct RestSocket {
    client: Client,
    send_url: String,
    logout_url: String,
    stop_url: String,
    poll_task: JoinHandle<()>,
}

impl RestSocket {
    async fn post_control(&self, url: &str, context: &str) -> Result<()> {
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| Error::Socket(format!("{context} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Socket(format!("{context} failed: {status} - {body}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Socket for RestSocket {
    async fn send_text(&self, to: &str, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.send_url)
            .json(&serde_json::json!({"chatId": to, "text": text}))
            .send()
            .await
            .map_err(|e| Error::Socket(format!("send failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Socket(format!("send failed: {status} - {body}")));
        }

        tracing::debug!(to, "message sent");
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.poll_task.abort();
        self.post_control(&self.logout_url, "logout").await
    }

    async fn close(&self) -> Result<()> {
        self.poll_task.abort();
        self.post_control(&self.stop_url, "stop").await
    }
}

impl Drop for RestSocket {
    fn drop(&mut self) {
        self.poll_task.abort();
    }
}
