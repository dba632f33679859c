//! Per-message request pipeline.
//!
//! `Received → Normalizing → Classifying → Logging → Replying → Done`
//!
//! A classification failure becomes the `Error` outcome instead of aborting:
//! the logging stage always runs with whatever outcome it is handed, and
//! exactly one reply is sent per message.

use std::{sync::Arc, time::Duration};

use crate::{
    domain::{IncomingMessage, Label, Outcome, Prediction},
    errors::InferenceError,
    normalize::normalize,
    ports::{Classifier, MessagingPort},
    request_log::{RequestLogRecord, RequestLogger},
};

pub const DISASTER_REPLY: &str = "⛔ Disaster detected!";
pub const NO_DISASTER_REPLY: &str = "✅ No disaster";
pub const ERROR_REPLY: &str = "⚠ An error occurred. Please try again later.";

/// Reply text for a classification outcome. Never includes error details.
pub fn reply_for(outcome: &Outcome) -> &'static str {
    match outcome {
        Ok(Label::Disaster) => DISASTER_REPLY,
        Ok(Label::NoDisaster) => NO_DISASTER_REPLY,
        Err(_) => ERROR_REPLY,
    }
}

/// What happened to one message. Returned for observability and tests.
#[derive(Debug)]
pub struct Handled {
    pub prediction: Prediction,
    pub reply: &'static str,
    pub logged: bool,
    pub replied: bool,
}

/// Immutable request-handling context, built once at startup and shared by
/// every concurrent pipeline run.
pub struct Pipeline {
    classifier: Arc<dyn Classifier>,
    request_log: Arc<RequestLogger>,
    inference_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        request_log: Arc<RequestLogger>,
        inference_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            request_log,
            inference_timeout,
        }
    }

    pub fn request_log(&self) -> &RequestLogger {
        &self.request_log
    }

    /// Run one message through the pipeline and send the reply.
    ///
    /// Never fails: inference, logging and send errors are recorded via
    /// `tracing` and the remaining stages still run.
    pub async fn handle(&self, msg: &IncomingMessage, messenger: &dyn MessagingPort) -> Handled {
        let normalized = normalize(&msg.text);
        let outcome = self.classify(normalized).await;
        if let Err(e) = &outcome {
            tracing::error!(user_id = msg.user_id.0, error = %e, "classification failed");
        }

        let prediction = Prediction::from_outcome(&outcome);
        let logged = self.log(msg, prediction).await;

        let reply = reply_for(&outcome);
        let replied = match messenger.send_text(msg.chat_id, reply).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    chat_id = msg.chat_id.0,
                    user_id = msg.user_id.0,
                    error = %e,
                    "failed to send reply"
                );
                false
            }
        };

        Handled {
            prediction,
            reply,
            logged,
            replied,
        }
    }

    /// Classify on the blocking pool, bounded by the inference timeout.
    ///
    /// A timed-out inference keeps running in the background; its result is dropped.
    pub async fn classify(&self, normalized: String) -> Outcome {
        let classifier = self.classifier.clone();
        let task = tokio::task::spawn_blocking(move || classifier.classify(&normalized));

        match tokio::time::timeout(self.inference_timeout, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => Err(InferenceError::Aborted(join_err.to_string())),
            Err(_) => Err(InferenceError::Timeout(self.inference_timeout)),
        }
    }

    async fn log(&self, msg: &IncomingMessage, prediction: Prediction) -> bool {
        let record = RequestLogRecord::from_message(msg, prediction);
        let request_log = self.request_log.clone();

        match tokio::task::spawn_blocking(move || request_log.append(&record)).await {
            // Failure details were already reported by the logger.
            Ok(res) => res.is_ok(),
            Err(join_err) => {
                tracing::error!(
                    user_id = msg.user_id.0,
                    error = %join_err,
                    "request log task aborted"
                );
                false
            }
        }
    }
}
