use super::resilient::edit_message_safe_resilient;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mirror_relay_core::transfer::ProgressSink;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::Mutex;

/// A chat message whose text is replaced as a transfer advances.
///
/// Edits to the text already displayed are skipped without an API call.
pub struct StatusMessage {
    bot: Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    shown: Mutex<Option<String>>,
}

impl StatusMessage {
    /// Wrap an already sent message.
    #[must_use]
    pub fn new(bot: Bot, chat_id: ChatId, msg_id: MessageId) -> Self {
        Self {
            bot,
            chat_id,
            msg_id,
            shown: Mutex::new(None),
        }
    }

    /// Wrap a message whose current text is known.
    #[must_use]
    pub fn with_text(bot: Bot, chat_id: ChatId, msg_id: MessageId, text: &str) -> Self {
        Self {
            shown: Mutex::new(Some(text.to_string())),
            ..Self::new(bot, chat_id, msg_id)
        }
    }

    /// Replace the text with pre-rendered HTML.
    ///
    /// # Errors
    ///
    /// Returns an error if the edit failed after retries.
    pub async fn show_html(&self, html: &str) -> Result<()> {
        let mut shown = self.shown.lock().await;
        if shown.as_deref() == Some(html) {
            return Ok(());
        }
        if !edit_message_safe_resilient(&self.bot, self.chat_id, self.msg_id, html).await {
            return Err(anyhow!("status edit failed"));
        }
        *shown = Some(html.to_string());
        Ok(())
    }

    /// Like [`Self::show_html`], but failures are only logged by the edit helper.
    pub async fn show(&self, html: &str) {
        let _ = self.show_html(html).await;
    }
}

#[async_trait]
impl ProgressSink for StatusMessage {
    async fn update(&self, text: &str) -> Result<()> {
        self.show_html(&html_escape::encode_text(text)).await
    }
}
