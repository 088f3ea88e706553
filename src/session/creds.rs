//! Pairing credential persistence
//!
//! The socket emits opaque credential blobs on every pairing update; they are
//! written through a temp file + rename so a crash mid-write never corrupts
//! the stored pairing.

use std::path::PathBuf;

use crate::Result;

/// Stores the socket's pairing credentials on disk
#[derive(Debug, Clone)]
pub struct CredsStore {
    path: PathBuf,
}

impl CredsStore {
    /// Create a store backed by the given file path
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load persisted credentials, if any
    ///
    /// An unreadable or unparseable file is treated as absent, and the
    /// session falls back to fresh QR pairing.
    #[must_use]
    pub fn load(&self) -> Option<serde_json::Value> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&content) {
            Ok(creds) => Some(creds),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "stored credentials unreadable, repairing via QR"
                );
                None
            }
        }
    }

    /// Persist updated credentials
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be written.
    pub fn save(&self, creds: &serde_json::Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(creds)?)?;
        std::fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "credentials persisted");
        Ok(())
    }

    /// Remove persisted credentials (logout)
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but can't be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "credentials cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
