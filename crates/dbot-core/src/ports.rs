use async_trait::async_trait;

use crate::{
    domain::{ChatId, Label},
    errors::InferenceError,
    Result,
};

/// Hexagonal port for sending replies back to the user.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()>;
}

/// Hexagonal port for the binary text classifier.
///
/// Implementations are loaded once and must be safe to share across
/// concurrently running pipelines. `classify` is blocking (CPU-bound
/// inference); the pipeline runs it on the blocking thread pool.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Classify already-normalized text.
    fn classify(&self, text: &str) -> std::result::Result<Label, InferenceError>;
}
