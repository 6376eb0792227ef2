use super::media::TelegramFetcher;
use super::resilient::{notify_owner, send_message_resilient};
use super::status::StatusMessage;
use super::views::{owner, parse_destination, DefaultRelayView, RelayView};
use crate::config::BotSettings;
use anyhow::Result;
use mirror_relay_core::upload::Host;
use mirror_relay_core::TransferError;
use mirror_relay_runtime::{PendingSelections, RelayPipeline, SelectionKind};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId};
use tracing::{debug, error, info, warn};

/// Everything a destination click needs besides the parsed data.
struct Click {
    bot: Bot,
    chat_id: ChatId,
    user_id: u64,
    status: StatusMessage,
}

/// Handle a destination button (`up:<host>` / `mi:<host>`).
///
/// # Errors
///
/// Returns an error if the callback carries no message to edit.
pub async fn handle_destination_callback(
    bot: Bot,
    q: CallbackQuery,
    pipeline: Arc<RelayPipeline>,
    pending: Arc<PendingSelections>,
    settings: Arc<BotSettings>,
) -> Result<()> {
    // Answer first: the client spinner only stops once the query is answered.
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        debug!(error = %e, "Failed to answer callback query");
    }

    let Some(data) = q.data.as_deref() else {
        return Ok(());
    };

    let (chat_id, msg_id): (ChatId, MessageId) = q
        .message
        .as_ref()
        .map(|m| (m.chat().id, m.id()))
        .ok_or_else(|| anyhow::anyhow!("Callback message missing chat id"))?;

    let click = Click {
        bot: bot.clone(),
        chat_id,
        user_id: q.from.id.0,
        status: StatusMessage::new(bot, chat_id, msg_id),
    };

    let Some((kind, host)) = parse_destination(data) else {
        click.status.show(DefaultRelayView::unknown_action()).await;
        return Ok(());
    };

    match kind {
        SelectionKind::Upload => upload_selected(click, host, &pipeline, &pending, &settings).await,
        SelectionKind::Mirror => mirror_selected(click, host, &pipeline, &pending, &settings).await,
    }
    Ok(())
}

async fn upload_selected(
    click: Click,
    host: Host,
    pipeline: &RelayPipeline,
    pending: &PendingSelections,
    settings: &BotSettings,
) {
    let attachment = match pending.take_upload(click.user_id).await {
        Ok(attachment) => attachment,
        Err(e) => {
            debug!(user_id = click.user_id, error = %e, "No pending upload");
            click
                .status
                .show(DefaultRelayView::selection_missing(SelectionKind::Upload))
                .await;
            return;
        }
    };

    let fetcher = TelegramFetcher::new(click.bot.clone());
    let result = pipeline
        .upload_attachment(&fetcher, &attachment, host, &click.status)
        .await;
    match result {
        Ok(link) => {
            let done = DefaultRelayView::upload_done(host, &link);
            click.status.show(&done).await;
            post(&click, done).await;
            notify_owner(
                &click.bot,
                settings.telegram.owner_chat(),
                owner::upload(click.user_id, host, &link),
            )
            .await;
        }
        Err(e) => {
            report_failure(&click, &e).await;
            pending.restore_upload(click.user_id, attachment).await;
        }
    }
}

async fn mirror_selected(
    click: Click,
    host: Host,
    pipeline: &RelayPipeline,
    pending: &PendingSelections,
    settings: &BotSettings,
) {
    let url = match pending.take_mirror(click.user_id).await {
        Ok(url) => url,
        Err(e) => {
            debug!(user_id = click.user_id, error = %e, "No pending mirror");
            click
                .status
                .show(DefaultRelayView::selection_missing(SelectionKind::Mirror))
                .await;
            return;
        }
    };

    info!(user_id = click.user_id, host = %host, url = %url, "Mirror started");
    match pipeline.mirror(&url, host, &click.status).await {
        Ok(report) => {
            click
                .status
                .show(&DefaultRelayView::mirror_done(host, &report.link))
                .await;
            post(
                &click,
                DefaultRelayView::mirror_summary(host, &report.filename, report.size, &report.link),
            )
            .await;
            notify_owner(
                &click.bot,
                settings.telegram.owner_chat(),
                owner::mirror(click.user_id, host, report.size, &url, &report.link),
            )
            .await;
        }
        Err(e) => report_failure(&click, &e).await,
    }
}

async fn post(click: &Click, text: String) {
    if let Err(e) = send_message_resilient(&click.bot, click.chat_id, text).await {
        warn!(chat_id = %click.chat_id, error = %e, "Failed to post result");
    }
}

async fn report_failure(click: &Click, err: &TransferError) {
    if err.is_user_correctable() {
        warn!(user_id = click.user_id, error = %err, "Relay request rejected");
    } else {
        error!(user_id = click.user_id, error = %err, "Relay failed");
    }
    click
        .status
        .show(&DefaultRelayView::error(&err.to_string()))
        .await;
}
