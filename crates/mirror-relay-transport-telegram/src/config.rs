//! Telegram transport settings.

use config::ConfigError;
use mirror_relay_core::config::RelaySettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use teloxide::types::ChatId;

/// Chat that receives activity notices when nothing else is configured.
pub const DEFAULT_OWNER_ID: i64 = 1_348_352_154;

const fn default_owner_id() -> i64 {
    DEFAULT_OWNER_ID
}

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
    /// User id that receives activity notices.
    #[serde(default = "default_owner_id")]
    pub owner_id: i64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            owner_id: DEFAULT_OWNER_ID,
        }
    }
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        mirror_relay_core::config::build_config()?.try_deserialize()
    }

    /// Chat id of the owner.
    #[must_use]
    pub const fn owner_chat(&self) -> ChatId {
        ChatId(self.owner_id)
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Transfer settings shared across transport handlers.
    pub relay: Arc<RelaySettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(relay: RelaySettings, telegram: TelegramSettings) -> Self {
        Self {
            relay: Arc::new(relay),
            telegram: Arc::new(telegram),
        }
    }
}
