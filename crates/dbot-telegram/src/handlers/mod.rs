//! Telegram update handlers.
//!
//! - `/start`, `/help`: static replies, no pipeline involvement
//! - plain text: normalize → classify → log → reply via `dbot-core`
//! - anything else is ignored

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;
mod commands;
mod text;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        tracing::debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };

    if text.starts_with('/') {
        return commands::handle_command(bot, msg).await;
    }

    text::handle_text(msg, state).await
}
