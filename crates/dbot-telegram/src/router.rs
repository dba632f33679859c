use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use dbot_core::{config::Config, pipeline::Pipeline, ports::MessagingPort};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub messenger: Arc<dyn MessagingPort>,
}

/// Long-poll Telegram until the process is stopped.
///
/// Updates from different chats are handled concurrently by the dispatcher;
/// each one goes through the pipeline independently.
pub async fn run_polling(cfg: Arc<Config>, pipeline: Arc<Pipeline>) -> anyhow::Result<()> {
    let telegram = TelegramMessenger::new(Bot::new(cfg.telegram_bot_token.clone()));
    let bot = telegram.bot();

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "bot started"),
        Err(e) => return Err(anyhow::anyhow!("telegram get_me failed: {e}")),
    }
    tracing::info!(
        log_dir = %pipeline.request_log().dir().display(),
        "writing request logs"
    );

    let state = Arc::new(AppState {
        pipeline,
        messenger: Arc::new(telegram),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
