//! Resilient messaging utilities with automatic retry for Telegram API operations.
//!
//! Transport calls retry on transient network failures using exponential
//! backoff with jitter. Transfers themselves are never retried here.

use anyhow::Result;
use mirror_relay_core::utils::{retry_transport_operation, truncate_str};
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, Message, MessageId, ParseMode};
use tracing::{debug, warn};

/// Telegram rejects texts above 4096 characters; keep a margin.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Send an HTML message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) -> Result<Message> {
    let text = text.into();
    retry_transport_operation(|| async {
        bot.send_message(chat_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message with automatic retry on network failures.
///
/// Returns `Ok(None)` when Telegram reports the text is unchanged.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
) -> Result<Option<Message>> {
    let text = text.into();
    retry_transport_operation(|| async {
        match bot
            .edit_message_text(chat_id, msg_id, text.clone())
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(msg) => Ok(Some(msg)),
            Err(e) => {
                if e.to_string().contains("message is not modified") {
                    return Ok(None);
                }
                Err(anyhow::anyhow!("Telegram edit error: {e}"))
            }
        }
    })
    .await
}

/// Edit message with graceful degradation and automatic retry.
///
/// Truncates overlong text, treats "not modified" and "not found" as
/// non-fatal and logs everything else.
///
/// # Returns
///
/// `false` only when the edit failed after retries.
pub async fn edit_message_safe_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
) -> bool {
    const ERROR_NOT_FOUND: &str = "message to edit not found";

    let text = if text.chars().count() > MAX_MESSAGE_CHARS {
        format!("{}...", truncate_str(text, MAX_MESSAGE_CHARS))
    } else {
        text.to_string()
    };

    match edit_message_resilient(bot, chat_id, msg_id, text).await {
        Ok(Some(_)) => true,
        Ok(None) => {
            debug!("Message update skipped: message is not modified");
            true
        }
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains(ERROR_NOT_FOUND) {
                debug!("Message update skipped: {err_msg}");
            } else {
                warn!("Failed to edit message after retries: {e}");
            }
            false
        }
    }
}

/// Send a local file as a document, retrying on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_document_resilient(
    bot: &Bot,
    chat_id: ChatId,
    path: &Path,
    filename: &str,
) -> Result<Message> {
    retry_transport_operation(|| async {
        let document = InputFile::file(path.to_path_buf()).file_name(filename.to_string());
        bot.send_document(chat_id, document)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram document error: {e}"))
    })
    .await
}

/// Best-effort notice to the owner; failures are logged and swallowed.
pub async fn notify_owner(bot: &Bot, owner: ChatId, text: impl Into<String>) {
    if let Err(e) = send_message_resilient(bot, owner, text).await {
        warn!(owner = %owner, error = %e, "Owner notification failed");
    }
}
