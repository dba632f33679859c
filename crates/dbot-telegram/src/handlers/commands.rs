use teloxide::{
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup},
};

pub const START_TEXT: &str = "Hi! I analyze text for information about disasters.";
pub const HELP_TEXT: &str = "📋 Just send a text in English for analysis";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Command {
    Start,
    Help,
}

impl Command {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            _ => None,
        }
    }

    fn reply(self) -> &'static str {
        match self {
            Command::Start => START_TEXT,
            Command::Help => HELP_TEXT,
        }
    }
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn help_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new("/help")]]).resize_keyboard(true)
}

pub async fn handle_command(bot: Bot, msg: Message) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let (name, _args) = parse_command(text);
    let Some(cmd) = Command::parse(&name) else {
        tracing::debug!(command = %name, "ignoring unknown command");
        return Ok(());
    };

    if let Err(e) = bot
        .send_message(msg.chat.id, cmd.reply())
        .reply_markup(help_keyboard())
        .await
    {
        tracing::error!(
            command = %name,
            chat_id = msg.chat.id.0,
            error = %e,
            "failed to send command reply"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix_and_args() {
        assert_eq!(
            parse_command("/Help@disaster_bot extra words"),
            ("help".to_string(), "extra words".to_string())
        );
        assert_eq!(parse_command("  /start  "), ("start".to_string(), String::new()));
    }

    #[test]
    fn only_start_and_help_are_known() {
        assert_eq!(Command::parse("start"), Some(Command::Start));
        assert_eq!(Command::parse("help"), Some(Command::Help));
        assert_eq!(Command::parse("stats"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn static_replies() {
        assert_eq!(Command::Start.reply(), START_TEXT);
        assert_eq!(Command::Help.reply(), HELP_TEXT);
    }
}
