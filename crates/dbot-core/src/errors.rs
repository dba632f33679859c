use std::time::Duration;

/// Process-level error type.
///
/// Adapter crates map their specific failures into this type. Anything that
/// surfaces here during startup is fatal; once polling has started, the
/// pipeline never lets an error reach this level.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model load error: {0}")]
    ModelLoad(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single classification attempt.
///
/// Always reported to the user as the generic error notice and logged with
/// the `Error` prediction. Never coerced into a `NoDisaster` label.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("inference failed: {0}")]
    Runtime(String),

    #[error("unexpected model output: {0}")]
    UnexpectedOutput(String),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference task aborted: {0}")]
    Aborted(String),
}

/// Failure to append a row to the daily request log.
#[derive(Debug, thiserror::Error)]
pub enum LogWriteError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}
