use super::media::pick_media;
use super::resilient::{notify_owner, send_document_resilient};
use super::status::StatusMessage;
use super::views::{destination_keyboard, owner, DefaultRelayView, RelayView};
use crate::config::BotSettings;
use anyhow::Result;
use mirror_relay_runtime::{LeechOutcome, PendingSelections, RelayPipeline, SelectionKind};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Show the welcome message.")]
    Start,
    /// Upload the replied-to attachment
    #[command(description = "Reply to a file to upload it to a host.")]
    U,
    /// Mirror a URL to a host
    #[command(description = "Mirror a URL to a host.")]
    Mirror(String),
    /// Download a URL into the chat
    #[command(description = "Download a URL and send it here.")]
    Leech(String),
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> u64 {
    msg.from.as_ref().map_or(0, |u| u.id.0)
}

/// First whitespace-separated token of a command argument.
#[must_use]
pub fn first_arg(args: &str) -> Option<&str> {
    args.split_whitespace().next()
}

async fn reply_html(bot: &Bot, msg: &Message, text: impl Into<String>) -> Result<Message> {
    Ok(bot
        .send_message(msg.chat.id, text.into())
        .parse_mode(ParseMode::Html)
        .await?)
}

/// Handle `/start`.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn start(bot: Bot, msg: Message, settings: Arc<BotSettings>) -> Result<()> {
    let name = msg
        .from
        .as_ref()
        .map(|u| u.first_name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("User");
    reply_html(
        &bot,
        &msg,
        DefaultRelayView::welcome(name, settings.relay.task_limit_bytes),
    )
    .await?;
    Ok(())
}

/// Handle `/u`: remember the replied-to attachment and offer the hosts.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn upload(bot: Bot, msg: Message, pending: Arc<PendingSelections>) -> Result<()> {
    let Some(target) = msg.reply_to_message() else {
        reply_html(&bot, &msg, DefaultRelayView::reply_to_file_first()).await?;
        return Ok(());
    };
    let Some(attachment) = pick_media(target) else {
        reply_html(&bot, &msg, DefaultRelayView::no_media()).await?;
        return Ok(());
    };

    let user_id = get_user_id_safe(&msg);
    info!(user_id, file = %attachment.filename, "Upload requested");
    pending.put_upload(user_id, attachment).await;
    offer_destinations(&bot, &msg, SelectionKind::Upload).await
}

/// Handle `/mirror <url>`: remember the URL and offer the hosts.
///
/// # Errors
///
/// Returns an error if the reply cannot be sent.
pub async fn mirror(
    bot: Bot,
    msg: Message,
    args: String,
    pending: Arc<PendingSelections>,
) -> Result<()> {
    let Some(url) = first_arg(&args) else {
        reply_html(&bot, &msg, DefaultRelayView::usage("mirror")).await?;
        return Ok(());
    };

    let user_id = get_user_id_safe(&msg);
    info!(user_id, url = %url, "Mirror requested");
    pending.put_mirror(user_id, url).await;
    offer_destinations(&bot, &msg, SelectionKind::Mirror).await
}

async fn offer_destinations(bot: &Bot, msg: &Message, kind: SelectionKind) -> Result<()> {
    bot.send_message(msg.chat.id, DefaultRelayView::choose_destination(kind))
        .reply_markup(destination_keyboard(kind))
        .await?;
    Ok(())
}

/// Handle `/leech <url>`: download and send the file into the chat.
///
/// # Errors
///
/// Returns an error if the initial status message cannot be sent.
pub async fn leech(
    bot: Bot,
    msg: Message,
    args: String,
    pipeline: Arc<RelayPipeline>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    let Some(url) = first_arg(&args) else {
        reply_html(&bot, &msg, DefaultRelayView::usage("leech")).await?;
        return Ok(());
    };

    let user_id = get_user_id_safe(&msg);
    let starting = DefaultRelayView::starting_download();
    let status_msg = reply_html(&bot, &msg, starting).await?;
    let status = StatusMessage::with_text(bot.clone(), msg.chat.id, status_msg.id, starting);
    let owner_chat = settings.telegram.owner_chat();

    match pipeline.leech(url, &status).await {
        Ok(LeechOutcome::Ready(file)) => {
            status.show(DefaultRelayView::uploading_to_telegram()).await;
            if let Err(e) = send_document_resilient(&bot, msg.chat.id, file.path(), file.filename()).await {
                warn!(user_id, url = %url, error = %e, "Sending leeched file failed");
                status.show(&DefaultRelayView::error(&e.to_string())).await;
                return Ok(());
            }
            status.show(DefaultRelayView::leech_done()).await;
            notify_owner(
                &bot,
                owner_chat,
                owner::leech(user_id, url, file.size(), file.filename()),
            )
            .await;
        }
        Ok(LeechOutcome::TooLargeForChat { size, limit, .. }) => {
            status
                .show(&DefaultRelayView::leech_too_large(size, limit))
                .await;
            notify_owner(&bot, owner_chat, owner::leech_rejected(user_id, url, size)).await;
        }
        Err(e) => {
            warn!(user_id, url = %url, error = %e, "Leech failed");
            status.show(&DefaultRelayView::error(&e.to_string())).await;
        }
    }
    Ok(())
}
