//! Filesystem-backed asset storage
//!
//! Finished assets live flat in a public uploads directory; in-flight chunked
//! transfers live in per-upload scratch directories that are removed after
//! assembly. Finished files are written to a temporary name and renamed into
//! place so a concurrent reader never observes a partial asset.

use std::path::PathBuf;

use super::{AssetKind, asset_code, generate_filename, sanitize_id};
use crate::{Error, Result};

/// A successfully stored asset
#[derive(Debug, Clone)]
pub struct StoredAsset {
    /// Composite reference code (`"<PREFIX>:<relative path>"`)
    pub code: String,

    /// Publicly reachable URL
    pub url: String,

    /// Path relative to the uploads directory
    pub path: String,
}

/// Stores uploaded assets and in-flight chunk transfers
#[derive(Debug, Clone)]
pub struct MediaStore {
    uploads_dir: PathBuf,
    chunk_dir: PathBuf,
    public_base_url: String,
}

impl MediaStore {
    /// Create a store
    ///
    /// `public_base_url` is the origin assets are served from; stored files
    /// become reachable at `<public_base_url>/uploads/<filename>`.
    #[must_use]
    pub fn new(uploads_dir: PathBuf, chunk_dir: PathBuf, public_base_url: String) -> Self {
        Self {
            uploads_dir,
            chunk_dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create the uploads and scratch directories
    ///
    /// # Errors
    ///
    /// Returns error if a directory can't be created.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.uploads_dir)?;
        std::fs::create_dir_all(&self.chunk_dir)?;
        Ok(())
    }

    /// Directory stored assets are served from
    #[must_use]
    pub fn uploads_dir(&self) -> &std::path::Path {
        &self.uploads_dir
    }

    /// Public URL of a stored filename
    #[must_use]
    pub fn public_url(&self, filename: &str) -> String {
        format!("{}/uploads/{filename}", self.public_base_url)
    }

    /// Store a complete asset
    ///
    /// # Errors
    ///
    /// Returns error if the file can't be written.
    pub fn save_asset(
        &self,
        kind: AssetKind,
        instance_id: &str,
        original_name: Option<&str>,
        data: &[u8],
    ) -> Result<StoredAsset> {
        std::fs::create_dir_all(&self.uploads_dir)?;

        let filename = generate_filename(kind, instance_id, original_name);
        let target = self.uploads_dir.join(&filename);
        let tmp = self.uploads_dir.join(format!("{filename}.partial"));

        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &target)?;

        tracing::info!(kind = %kind, file = %filename, bytes = data.len(), "asset stored");
        Ok(self.stored(kind, filename))
    }

    /// Persist one chunk of an in-flight transfer
    ///
    /// # Errors
    ///
    /// Returns error if the upload id sanitizes to nothing or the chunk can't
    /// be written.
    pub fn save_chunk(&self, upload_id: &str, index: u32, data: &[u8]) -> Result<()> {
        let dir = self.transfer_dir(upload_id)?;
        std::fs::create_dir_all(&dir)?;
        std::fs::write(chunk_path(&dir, index), data)?;
        Ok(())
    }

    /// Assemble a completed transfer into one stored asset
    ///
    /// Verifies every expected chunk file exists before concatenating them in
    /// index order, then removes the transfer directory.
    ///
    /// # Errors
    ///
    /// Returns error if a chunk is missing or any file operation fails.
    pub fn assemble(
        &self,
        upload_id: &str,
        total_chunks: u32,
        kind: AssetKind,
        instance_id: &str,
        original_name: Option<&str>,
    ) -> Result<StoredAsset> {
        let dir = self.transfer_dir(upload_id)?;

        let mut parts = Vec::with_capacity(total_chunks as usize);
        for index in 0..total_chunks {
            let part = chunk_path(&dir, index);
            if !part.is_file() {
                return Err(Error::Media(format!(
                    "upload {upload_id} is missing chunk {index}"
                )));
            }
            parts.push(part);
        }

        std::fs::create_dir_all(&self.uploads_dir)?;
        let filename = generate_filename(kind, instance_id, original_name);
        let target = self.uploads_dir.join(&filename);
        let tmp = self.uploads_dir.join(format!("{filename}.partial"));

        let mut out = std::fs::File::create(&tmp)?;
        for part in &parts {
            let mut input = std::fs::File::open(part)?;
            std::io::copy(&mut input, &mut out)?;
        }
        out.sync_all()?;
        drop(out);
        std::fs::rename(&tmp, &target)?;

        if let Err(e) = std::fs::remove_dir_all(&dir) {
            tracing::warn!(upload_id, error = %e, "failed to remove transfer directory");
        }

        tracing::info!(
            kind = %kind,
            upload_id,
            chunks = total_chunks,
            file = %filename,
            "chunked asset assembled"
        );
        Ok(self.stored(kind, filename))
    }

    /// Best-effort removal of a failed transfer's scratch directory
    pub fn discard_transfer(&self, upload_id: &str) {
        if let Ok(dir) = self.transfer_dir(upload_id) {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(upload_id, error = %e, "failed to discard transfer");
                }
            }
        }
    }

    /// Scratch directory for a transfer, keyed by the sanitized upload id
    fn transfer_dir(&self, upload_id: &str) -> Result<PathBuf> {
        let clean = sanitize_id(upload_id);
        if clean.is_empty() {
            return Err(Error::Media("invalid upload id".to_string()));
        }
        Ok(self.chunk_dir.join(clean))
    }

    fn stored(&self, kind: AssetKind, filename: String) -> StoredAsset {
        StoredAsset {
            code: asset_code(kind, &filename),
            url: self.public_url(&filename),
            path: filename,
        }
    }
}

/// Chunk file path within a transfer directory
fn chunk_path(dir: &std::path::Path, index: u32) -> PathBuf {
    dir.join(format!("{index}.part"))
}
