//! Configuration management for the bridge

pub mod file;

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::Result;

/// Default HTTP port
const DEFAULT_PORT: u16 = 18790;

/// Default delay before an automatic reconnect attempt
const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Default sidecar poll interval
const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Instance identifier used in asset filenames and status events
    pub instance_id: String,

    /// Port to listen on
    pub port: u16,

    /// Data directory (credentials, chunk scratch space)
    pub data_dir: PathBuf,

    /// Public uploads directory
    pub uploads_dir: PathBuf,

    /// Public base URL used when building asset URLs
    pub public_base_url: String,

    /// Token required by the upload endpoints; uploads are rejected when unset
    pub upload_token: Option<String>,

    /// Bearer key for the session control endpoints (from `WABRIDGE_API_KEY`)
    pub api_key: Option<String>,

    /// Session / socket configuration
    pub session: SessionConfig,

    /// Auto-reply configuration
    pub auto_reply: AutoReplyConfig,
}

/// Session / socket configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the WhatsApp HTTP gateway sidecar; session disabled when unset
    pub gateway_url: Option<String>,

    /// Session name registered with the sidecar
    pub session_name: String,

    /// Delay before an automatic reconnect attempt
    pub reconnect_delay: std::time::Duration,

    /// Sidecar poll interval
    pub poll_interval: std::time::Duration,
}

/// Auto-reply configuration
#[derive(Debug, Clone)]
pub struct AutoReplyConfig {
    /// Enable the auto-reply responder
    pub enabled: bool,

    /// OpenAI-compatible API base URL
    pub api_url: String,

    /// API key for the completion endpoint
    pub api_key: Option<SecretString>,

    /// Model identifier
    pub model: String,

    /// System prompt prefixed to every completion request
    pub system_prompt: String,

    /// Fixed reply sent when the completion call fails
    pub fallback_reply: String,

    /// Max tokens per generated reply
    pub max_tokens: u32,
}

impl Default for AutoReplyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are a helpful assistant replying to WhatsApp messages. \
                            Keep answers short and conversational."
                .to_string(),
            fallback_reply: "Sorry, I couldn't process that message right now.".to_string(),
            max_tokens: 512,
        }
    }
}

impl AutoReplyConfig {
    /// Whether the responder should call the completion API
    ///
    /// Requires both the enable flag and an API key.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}

impl Config {
    /// Load configuration: defaults, then TOML file overlay, then environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicitly given config file can't be loaded or if
    /// a directory can't be resolved.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let f = file::load_config_file(config_path)?;

        let data_dir = f
            .storage
            .data_dir
            .map(PathBuf::from)
            .or_else(|| env_var("WABRIDGE_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(default_data_dir);

        let uploads_dir = f
            .storage
            .uploads_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("uploads"));

        let port = env_var("WABRIDGE_PORT")
            .and_then(|s| s.parse().ok())
            .or(f.server.port)
            .unwrap_or(DEFAULT_PORT);

        let public_base_url = env_var("WABRIDGE_PUBLIC_BASE_URL")
            .or(f.server.public_base_url)
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let session = SessionConfig {
            gateway_url: env_var("WABRIDGE_SOCKET_URL").or(f.session.gateway_url),
            session_name: f.session.session_name.unwrap_or_else(|| "default".to_string()),
            reconnect_delay: std::time::Duration::from_secs(
                f.session
                    .reconnect_delay_secs
                    .unwrap_or(DEFAULT_RECONNECT_DELAY_SECS),
            ),
            poll_interval: std::time::Duration::from_secs(
                f.session
                    .poll_interval_secs
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
        };

        let defaults = AutoReplyConfig::default();
        let auto_reply = AutoReplyConfig {
            enabled: f.auto_reply.enabled.unwrap_or(defaults.enabled),
            api_url: f.auto_reply.api_url.unwrap_or(defaults.api_url),
            api_key: env_var("WABRIDGE_COMPLETION_API_KEY")
                .or_else(|| env_var("OPENAI_API_KEY"))
                .or(f.auto_reply.api_key)
                .map(SecretString::from),
            model: f.auto_reply.model.unwrap_or(defaults.model),
            system_prompt: f.auto_reply.system_prompt.unwrap_or(defaults.system_prompt),
            fallback_reply: f.auto_reply.fallback_reply.unwrap_or(defaults.fallback_reply),
            max_tokens: f.auto_reply.max_tokens.unwrap_or(defaults.max_tokens),
        };

        Ok(Self {
            instance_id: env_var("WABRIDGE_INSTANCE")
                .or(f.instance)
                .unwrap_or_else(|| "default".to_string()),
            port,
            data_dir,
            uploads_dir,
            public_base_url,
            upload_token: env_var("WABRIDGE_UPLOAD_TOKEN").or(f.security.upload_token),
            api_key: env_var("WABRIDGE_API_KEY").or(f.security.api_key),
            session,
            auto_reply,
        })
    }

    /// Scratch directory for in-flight chunked uploads
    #[must_use]
    pub fn chunk_tmp_dir(&self) -> PathBuf {
        self.data_dir.join("tmp").join("chunks")
    }

    /// Path of the persisted socket credentials
    #[must_use]
    pub fn creds_path(&self) -> PathBuf {
        self.data_dir.join("creds.json")
    }
}

/// Read a non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Default data directory: `~/.local/share/omni/wabridge` (platform dependent)
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".wabridge"),
        |d| d.data_dir().join("omni").join("wabridge"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_reply_inactive_without_key() {
        let config = AutoReplyConfig {
            enabled: true,
            ..AutoReplyConfig::default()
        };
        assert!(!config.is_active());
    }

    #[test]
    fn auto_reply_inactive_when_disabled() {
        let config = AutoReplyConfig {
            api_key: Some(SecretString::from("sk-test")),
            ..AutoReplyConfig::default()
        };
        assert!(!config.is_active());
    }

    #[test]
    fn auto_reply_active_with_flag_and_key() {
        let config = AutoReplyConfig {
            enabled: true,
            api_key: Some(SecretString::from("sk-test")),
            ..AutoReplyConfig::default()
        };
        assert!(config.is_active());
    }

    #[test]
    fn chunk_tmp_dir_is_under_data_dir() {
        let config = Config {
            instance_id: "default".to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from("/tmp/wb"),
            uploads_dir: PathBuf::from("/tmp/wb/uploads"),
            public_base_url: "http://localhost:18790".to_string(),
            upload_token: None,
            api_key: None,
            session: SessionConfig {
                gateway_url: None,
                session_name: "default".to_string(),
                reconnect_delay: std::time::Duration::from_secs(5),
                poll_interval: std::time::Duration::from_secs(2),
            },
            auto_reply: AutoReplyConfig::default(),
        };
        assert_eq!(config.chunk_tmp_dir(), PathBuf::from("/tmp/wb/tmp/chunks"));
        assert_eq!(config.creds_path(), PathBuf::from("/tmp/wb/creds.json"));
    }
}
