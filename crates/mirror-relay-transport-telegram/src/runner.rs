use crate::bot;
use crate::bot::handlers::Command;
use crate::config::BotSettings;
use mirror_relay_core::upload::HttpUploadDispatcher;
use mirror_relay_runtime::{PendingSelections, RelayPipeline};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let pipeline = init_pipeline(&settings);
    let pending = init_pending(&settings);

    let bot = Bot::new(settings.telegram.telegram_token.clone());
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {e}");
    }
    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![pipeline, pending, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_pipeline(settings: &BotSettings) -> Arc<RelayPipeline> {
    let relay = settings.relay.as_ref();
    let pipeline = HttpUploadDispatcher::from_settings(relay)
        .and_then(|dispatcher| RelayPipeline::new(relay, Arc::new(dispatcher)));

    match pipeline {
        Ok(pipeline) => {
            info!(
                task_limit = relay.task_limit_bytes,
                relay_limit = relay.relay_limit_bytes,
                temp_dir = %relay.temp_dir().display(),
                "Relay pipeline initialized."
            );
            Arc::new(pipeline)
        }
        Err(e) => {
            error!("Failed to initialize relay pipeline: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_pending(settings: &BotSettings) -> Arc<PendingSelections> {
    let ttl = settings.relay.pending_ttl();
    info!("Initializing PendingSelections (ttl: {}s)", ttl.as_secs());
    Arc::new(PendingSelections::new(ttl))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_destination_callback))
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    pipeline: Arc<RelayPipeline>,
    pending: Arc<PendingSelections>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg, settings).await,
        Command::U => bot::handlers::upload(bot, msg, pending).await,
        Command::Mirror(args) => bot::handlers::mirror(bot, msg, args, pending).await,
        Command::Leech(args) => bot::handlers::leech(bot, msg, args, pipeline, settings).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_destination_callback(
    bot: Bot,
    q: CallbackQuery,
    pipeline: Arc<RelayPipeline>,
    pending: Arc<PendingSelections>,
    settings: Arc<BotSettings>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) =
        bot::callbacks::handle_destination_callback(bot, q, pipeline, pending, settings).await
    {
        error!("Destination callback handler error: {}", e);
    }
    respond(())
}
