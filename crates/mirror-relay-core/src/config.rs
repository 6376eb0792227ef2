//! Configuration and settings management
//!
//! Loads settings from environment variables and config files and defines the
//! transfer limits.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Ceiling for a single download task (60 MiB).
pub const MAX_TASK_BYTES: u64 = 60 * 1024 * 1024;
/// Ceiling for forwarding a downloaded file back into the chat (45 MiB).
pub const MAX_RELAY_BYTES: u64 = 45 * 1024 * 1024;
/// Seconds without new data before a download is considered stalled.
pub const STALL_TIMEOUT_SECS: u64 = 60;
/// Minimum seconds between two progress emissions.
pub const PROGRESS_INTERVAL_SECS: u64 = 5;
/// TCP connect timeout for outbound requests.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;
/// Upper bound for a whole upload request, response included.
pub const UPLOAD_TIMEOUT_SECS: u64 = 900;
/// Timeout for metadata lookups (Pixeldrain file info).
pub const METADATA_TIMEOUT_SECS: u64 = 30;
/// Write buffer size used while streaming a body to disk (256 KiB).
pub const DOWNLOAD_CHUNK_SIZE: usize = 256 * 1024;
/// How long a pending destination choice stays valid.
pub const PENDING_SELECTION_TTL_SECS: u64 = 900;
/// Maximum number of pending destination choices kept in memory.
pub const PENDING_SELECTION_MAX_SIZE: u64 = 10_000;

/// Browser-like user agent sent with every download request.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";

// Telegram API retry configuration
/// Maximum attempts for a Telegram API call
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Initial backoff between Telegram API attempts
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound for the backoff between Telegram API attempts
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;

/// Build the layered configuration shared by all settings structs.
///
/// Sources, later ones overriding earlier ones: `config/default`,
/// `config/{RUN_MODE}`, `config/local`, `APP__*` variables and finally bare
/// environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present config file cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Environment::default() maps UPPER_SNAKE_CASE to snake_case; empty vars count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Transfer settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RelaySettings {
    /// Byte ceiling for downloads
    #[serde(default = "default_task_limit")]
    pub task_limit_bytes: u64,
    /// Byte ceiling for sending a file back into the chat
    #[serde(default = "default_relay_limit")]
    pub relay_limit_bytes: u64,
    /// Seconds of silence before a download fails as stalled
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout_secs: u64,
    /// Minimum seconds between progress updates
    #[serde(default = "default_progress_interval")]
    pub progress_interval_secs: u64,
    /// Connect timeout for outbound HTTP
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total time allowed for one upload to a host
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    /// Directory for temporary downloads (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
    /// Pixeldrain API key used for authenticated uploads
    pub pixeldrain_api_key: Option<String>,
    /// Lifetime of a pending destination choice
    #[serde(default = "default_pending_ttl")]
    pub pending_ttl_secs: u64,
}

const fn default_task_limit() -> u64 {
    MAX_TASK_BYTES
}

const fn default_relay_limit() -> u64 {
    MAX_RELAY_BYTES
}

const fn default_stall_timeout() -> u64 {
    STALL_TIMEOUT_SECS
}

const fn default_progress_interval() -> u64 {
    PROGRESS_INTERVAL_SECS
}

const fn default_connect_timeout() -> u64 {
    CONNECT_TIMEOUT_SECS
}

const fn default_upload_timeout() -> u64 {
    UPLOAD_TIMEOUT_SECS
}

const fn default_pending_ttl() -> u64 {
    PENDING_SELECTION_TTL_SECS
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            task_limit_bytes: MAX_TASK_BYTES,
            relay_limit_bytes: MAX_RELAY_BYTES,
            stall_timeout_secs: STALL_TIMEOUT_SECS,
            progress_interval_secs: PROGRESS_INTERVAL_SECS,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            temp_dir: None,
            pixeldrain_api_key: None,
            pending_ttl_secs: PENDING_SELECTION_TTL_SECS,
        }
    }
}

impl RelaySettings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let mut settings: Self = build_config()?.try_deserialize()?;

        if settings.pixeldrain_api_key.is_none() {
            if let Ok(val) = std::env::var("PIXELDRAIN_API_KEY") {
                if !val.is_empty() {
                    settings.pixeldrain_api_key = Some(val);
                }
            }
        }

        Ok(settings)
    }

    /// Stall timeout as a `Duration`.
    #[must_use]
    pub const fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    /// Progress throttle interval as a `Duration`.
    #[must_use]
    pub const fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    /// Connect timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Upload request timeout as a `Duration`.
    #[must_use]
    pub const fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// How long a pending destination choice stays valid.
    #[must_use]
    pub const fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    /// Directory where temporary downloads are created.
    #[must_use]
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
