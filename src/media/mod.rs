//! Media asset classification and naming
//!
//! Uploaded assets are bucketed into three categories, stored under
//! collision-resistant filenames, and referenced externally by a composite
//! `"<PREFIX>:<relative path>"` code.

pub mod store;

pub use store::{MediaStore, StoredAsset};

use rand::RngCore;

/// Category of a stored asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Image file (JPEG, PNG, GIF, WebP)
    Image,
    /// Video file (MP4, WebM)
    Video,
    /// Audio file (OGG, MP3, WAV, FLAC)
    Audio,
}

impl AssetKind {
    /// Code prefix for this category
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Image => "IMG",
            Self::Video => "VIDEO",
            Self::Audio => "AUDIO",
        }
    }

    /// Determine the category from a MIME type prefix
    ///
    /// Anything outside `image/`, `video/`, `audio/` is unsupported.
    #[must_use]
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let lower = mime_type.trim().to_lowercase();
        if lower.starts_with("image/") {
            Some(Self::Image)
        } else if lower.starts_with("video/") {
            Some(Self::Video)
        } else if lower.starts_with("audio/") {
            Some(Self::Audio)
        } else {
            None
        }
    }

    /// Extension used when the original filename provides none
    #[must_use]
    pub const fn default_extension(self) -> &'static str {
        match self {
            Self::Image => "jpg",
            Self::Video => "mp4",
            Self::Audio => "ogg",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Sniff an asset category from raw content
///
/// Checks well-known magic numbers. Used by the chunked endpoint when no
/// usable `file_type` was declared.
#[must_use]
pub fn sniff_kind(data: &[u8]) -> Option<AssetKind> {
    if data.len() < 12 {
        return None;
    }

    // RIFF containers: WebP is an image, WAV is audio
    if &data[0..4] == b"RIFF" {
        return match &data[8..12] {
            b"WEBP" => Some(AssetKind::Image),
            b"WAVE" => Some(AssetKind::Audio),
            _ => None,
        };
    }

    if data.starts_with(&[0xFF, 0xD8, 0xFF])
        || data.starts_with(&[0x89, b'P', b'N', b'G'])
        || data.starts_with(b"GIF8")
    {
        return Some(AssetKind::Image);
    }

    // ISO base media (MP4/MOV family) puts "ftyp" at offset 4
    if &data[4..8] == b"ftyp" || data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(AssetKind::Video);
    }

    if data.starts_with(b"OggS")
        || data.starts_with(b"ID3")
        || data.starts_with(b"fLaC")
        || data.starts_with(&[0xFF, 0xFB])
        || data.starts_with(&[0xFF, 0xF3])
    {
        return Some(AssetKind::Audio);
    }

    None
}

/// Composite asset reference: `"<PREFIX>:<relative path>"`
#[must_use]
pub fn asset_code(kind: AssetKind, relative_path: &str) -> String {
    format!("{}:{relative_path}", kind.prefix())
}

/// Keep only `[A-Za-z0-9_-]`, so ids are safe as path components
#[must_use]
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Extract a usable extension from an original filename
///
/// Keeps alphanumeric characters only, lowercased; falls back to the
/// category default.
#[must_use]
pub fn extension_for(kind: AssetKind, original_name: Option<&str>) -> String {
    let ext: String = original_name
        .and_then(|name| name.rsplit_once('.').map(|(_, e)| e))
        .map(|e| {
            e.chars()
                .filter(char::is_ascii_alphanumeric)
                .flat_map(char::to_lowercase)
                .collect()
        })
        .unwrap_or_default();

    if ext.is_empty() {
        kind.default_extension().to_string()
    } else {
        ext
    }
}

/// Generate a collision-resistant stored filename
///
/// `<PREFIX>_<instance>_<unix-timestamp>_<8 hex chars>.<ext>`. The random
/// suffix keeps two uploads within the same second apart.
#[must_use]
pub fn generate_filename(kind: AssetKind, instance_id: &str, original_name: Option<&str>) -> String {
    let instance = {
        let clean = sanitize_id(instance_id);
        if clean.is_empty() {
            "default".to_string()
        } else {
            clean
        }
    };

    let mut suffix = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut suffix);

    format!(
        "{}_{}_{}_{}.{}",
        kind.prefix(),
        instance,
        chrono::Utc::now().timestamp(),
        hex::encode(suffix),
        extension_for(kind, original_name),
    )
}
