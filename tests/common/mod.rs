//! Shared test utilities

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use wa_bridge::api::{self, ApiState};
use wa_bridge::config::AutoReplyConfig;
use wa_bridge::events::EventBus;
use wa_bridge::media::MediaStore;
use wa_bridge::responder::Responder;
use wa_bridge::session::socket::{Socket, SocketEvent, SocketFactory};
use wa_bridge::session::{CredsStore, SessionManager};

/// Upload token configured in the test app
pub const TEST_TOKEN: &str = "test-upload-token";

/// Factory that never connects (upload tests don't need a live session)
struct OfflineFactory;

#[async_trait]
impl SocketFactory for OfflineFactory {
    async fn connect(
        &self,
        _creds: Option<serde_json::Value>,
    ) -> wa_bridge::Result<(Box<dyn Socket>, mpsc::Receiver<SocketEvent>)> {
        Err(wa_bridge::Error::Socket("offline".to_string()))
    }
}

/// A router plus the scratch directory backing its media store
pub struct TestApp {
    pub router: axum::Router,
    pub dir: tempfile::TempDir,
}

impl TestApp {
    /// Path of the public uploads directory
    #[must_use]
    pub fn uploads_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    /// Path of the chunk scratch directory
    #[must_use]
    pub fn chunks_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("chunks")
    }

    /// Stored asset filenames, sorted
    #[must_use]
    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.uploads_dir())
            .map(|entries| {
                entries
                    .filter_map(std::result::Result::ok)
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Build a test app with upload token configured and no API key
#[must_use]
pub fn build_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("failed to create temp dir");

    let bus = EventBus::new();
    let store = MediaStore::new(
        dir.path().join("uploads"),
        dir.path().join("chunks"),
        "http://localhost:18790".to_string(),
    );
    store.ensure_dirs().expect("failed to create store dirs");

    let session = SessionManager::new(
        "testinst".to_string(),
        Arc::new(OfflineFactory),
        CredsStore::new(dir.path().join("creds.json")),
        bus.clone(),
        Arc::new(Responder::new(&AutoReplyConfig::default())),
        Duration::from_millis(50),
    );

    let state = Arc::new(ApiState {
        instance_id: "testinst".to_string(),
        session,
        bus,
        store,
        upload_token: Some(TEST_TOKEN.to_string()),
        api_key: None,
    });

    TestApp {
        router: api::router(state),
        dir,
    }
}

/// One part of a multipart body
pub enum Part<'a> {
    /// Plain text field
    Text(&'a str, &'a str),
    /// File field: name, filename, content type, bytes
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

/// Encode a multipart/form-data body
#[must_use]
pub fn multipart_body(boundary: &str, parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
