//! TOML configuration file loading
//!
//! Supports `~/.config/omni/wabridge/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct BridgeConfigFile {
    /// Instance identifier used in asset filenames and status events
    #[serde(default)]
    pub instance: Option<String>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Storage paths
    #[serde(default)]
    pub storage: StorageFileConfig,

    /// Session / socket configuration
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Auto-reply configuration
    #[serde(default)]
    pub auto_reply: AutoReplyFileConfig,

    /// Tokens for the upload and control surfaces
    #[serde(default)]
    pub security: SecurityFileConfig,
}

/// HTTP server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// Public base URL used when building asset URLs
    pub public_base_url: Option<String>,
}

/// Storage paths
#[derive(Debug, Default, Deserialize)]
pub struct StorageFileConfig {
    /// Data directory (credentials, default parent for uploads)
    pub data_dir: Option<String>,

    /// Public uploads directory
    pub uploads_dir: Option<String>,
}

/// Session / socket configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Base URL of the WhatsApp HTTP gateway sidecar
    pub gateway_url: Option<String>,

    /// Session name registered with the sidecar
    pub session_name: Option<String>,

    /// Delay before an automatic reconnect attempt, in seconds
    pub reconnect_delay_secs: Option<u64>,

    /// Sidecar poll interval, in seconds
    pub poll_interval_secs: Option<u64>,
}

/// Auto-reply configuration
#[derive(Debug, Default, Deserialize)]
pub struct AutoReplyFileConfig {
    /// Enable the auto-reply responder
    pub enabled: Option<bool>,

    /// OpenAI-compatible API base URL
    pub api_url: Option<String>,

    /// API key for the completion endpoint
    pub api_key: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// System prompt prefixed to every completion request
    pub system_prompt: Option<String>,

    /// Fixed reply sent when the completion call fails
    pub fallback_reply: Option<String>,

    /// Max tokens per generated reply
    pub max_tokens: Option<u32>,
}

/// Tokens for the upload and control surfaces
#[derive(Debug, Default, Deserialize)]
pub struct SecurityFileConfig {
    /// Token required by the upload endpoints (form field `csrf_token`)
    pub upload_token: Option<String>,

    /// Bearer key for the session control endpoints
    pub api_key: Option<String>,
}

/// Load the TOML config file from the given path, or the standard path
///
/// Returns `BridgeConfigFile::default()` if the default file doesn't exist or
/// can't be parsed.
///
/// # Errors
///
/// Returns error if an explicitly given path doesn't exist or fails to
/// parse.
pub fn load_config_file(path: Option<&std::path::Path>) -> crate::Result<BridgeConfigFile> {
    let (path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match config_file_path() {
            Some(p) => (p, false),
            None => return Ok(BridgeConfigFile::default()),
        },
    };

    if !path.exists() {
        if explicit {
            return Err(crate::Error::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(BridgeConfigFile::default());
    }

    let content = std::fs::read_to_string(&path)?;
    match toml::from_str(&content) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            Ok(config)
        }
        Err(e) if explicit => Err(e.into()),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to parse config file, using defaults"
            );
            Ok(BridgeConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/omni/wabridge/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("omni")
            .join("wabridge")
            .join("config.toml")
    })
}
