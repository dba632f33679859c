use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed, immutable configuration, loaded once at startup and shared as `Arc<Config>`.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,

    // Model
    pub model_dir: PathBuf,
    pub model_uses_token_type_ids: bool,
    pub onnx_intra_threads: usize,
    pub inference_timeout: Duration,

    // Request log
    pub log_dir: PathBuf,
}

impl Config {
    /// Load from the process environment (plus an optional `.env` file) and
    /// make sure the log directory exists.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let cfg = Self::from_lookup(|key| env::var(key).ok())?;
        fs::create_dir_all(&cfg.log_dir)?;
        Ok(cfg)
    }

    /// Build a config from an arbitrary variable source. No filesystem access.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        // Required
        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;
        let model_dir = get("MODEL_PATH").map(PathBuf::from).ok_or_else(|| {
            Error::Config("MODEL_PATH environment variable is required".to_string())
        })?;

        // Optional
        let log_dir = PathBuf::from(get("LOG_DIR").unwrap_or_else(|| "logs".to_string()));
        let inference_timeout = Duration::from_millis(
            parse_u64(get("INFERENCE_TIMEOUT_MS"), "INFERENCE_TIMEOUT_MS")?.unwrap_or(30_000),
        );
        let onnx_intra_threads =
            parse_u64(get("ONNX_INTRA_THREADS"), "ONNX_INTRA_THREADS")?.unwrap_or(1).max(1)
                as usize;
        let model_uses_token_type_ids = get("MODEL_USES_TOKEN_TYPE_IDS")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);

        if inference_timeout.is_zero() {
            return Err(Error::Config(
                "INFERENCE_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            telegram_bot_token,
            model_dir,
            model_uses_token_type_ids,
            onnx_intra_threads,
            inference_timeout,
            log_dir,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_u64(v: Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(v) = v else {
        return Ok(None);
    };
    v.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| Error::Config(format!("{key} must be a non-negative integer: {e}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
