use chrono::{DateTime, Local};
use serde::Serialize;

use crate::errors::InferenceError;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// One inbound text message, as handed over by the transport.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub text: String,
    pub received_at: DateTime<Local>,
}

/// Label produced by a successful classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Label {
    NoDisaster,
    Disaster,
}

impl Label {
    /// Map a class index of the binary model onto a label.
    pub fn from_class_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Label::NoDisaster),
            1 => Some(Label::Disaster),
            _ => None,
        }
    }
}

/// Tagged outcome of one classification attempt.
pub type Outcome = std::result::Result<Label, InferenceError>;

/// What ends up in the `prediction` column of the request log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Prediction {
    #[serde(rename = "Disaster")]
    Disaster,
    #[serde(rename = "No disaster")]
    NoDisaster,
    #[serde(rename = "Error")]
    Error,
}

impl Prediction {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Ok(Label::Disaster) => Prediction::Disaster,
            Ok(Label::NoDisaster) => Prediction::NoDisaster,
            Err(_) => Prediction::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Prediction::Disaster => "Disaster",
            Prediction::NoDisaster => "No disaster",
            Prediction::Error => "Error",
        }
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
