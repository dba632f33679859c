use std::sync::Arc;

use chrono::{DateTime, Local};
use teloxide::prelude::*;

use dbot_core::domain::{ChatId, IncomingMessage, UserId};

use crate::router::AppState;

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let received_at = Local::now();

    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let incoming = incoming_message(
        msg.chat.id.0,
        user.id.0,
        user.username.as_deref(),
        &user.first_name,
        text,
        received_at,
    );
    let handled = state
        .pipeline
        .handle(&incoming, state.messenger.as_ref())
        .await;

    tracing::debug!(
        user_id = incoming.user_id.0,
        prediction = %handled.prediction,
        logged = handled.logged,
        replied = handled.replied,
        "message handled"
    );

    Ok(())
}

fn incoming_message(
    chat_id: i64,
    user_id: u64,
    username: Option<&str>,
    first_name: &str,
    text: &str,
    received_at: DateTime<Local>,
) -> IncomingMessage {
    IncomingMessage {
        chat_id: ChatId(chat_id),
        user_id: UserId(user_id as i64),
        username: username.filter(|s| !s.is_empty()).map(str::to_string),
        first_name: Some(first_name).filter(|s| !s.is_empty()).map(str::to_string),
        text: text.to_string(),
        received_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_identity_and_raw_text() {
        let now = Local::now();
        let m = incoming_message(-100, 987654321, Some("bob"), "Bob", "#Flood @here", now);
        assert_eq!(m.chat_id, ChatId(-100));
        assert_eq!(m.user_id, UserId(987654321));
        assert_eq!(m.username.as_deref(), Some("bob"));
        assert_eq!(m.first_name.as_deref(), Some("Bob"));
        assert_eq!(m.text, "#Flood @here");
        assert_eq!(m.received_at, now);
    }

    #[test]
    fn missing_identity_becomes_none() {
        let m = incoming_message(1, 2, None, "", "hi", Local::now());
        assert_eq!(m.username, None);
        assert_eq!(m.first_name, None);

        let m = incoming_message(1, 2, Some(""), "Ann", "hi", Local::now());
        assert_eq!(m.username, None);
        assert_eq!(m.first_name.as_deref(), Some("Ann"));
    }
}
