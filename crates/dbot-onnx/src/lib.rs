//! ONNX Runtime classifier adapter.
//!
//! Loads `model.onnx` (a sequence-classification export with a `[1, 2]` logits
//! output) and `tokenizer.json` from a local model directory and implements the
//! `dbot-core` [`Classifier`] port.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer};

use dbot_core::{
    domain::Label,
    errors::{Error, InferenceError},
    ports::Classifier,
    Result,
};

/// Fixed input window of the model; every request is padded or truncated to it.
pub const MAX_SEQ_LEN: usize = 256;

/// Number of output classes of the binary model.
pub const NUM_LABELS: usize = 2;

#[derive(Clone, Debug)]
pub struct OnnxClassifierConfig {
    pub model_dir: PathBuf,
    pub intra_threads: usize,
    pub use_token_type_ids: bool,
}

pub struct OnnxClassifier {
    /// `Session::run` needs exclusive access; concurrent requests queue here.
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    use_token_type_ids: bool,
}

// Safety: the Session is only reached through the Mutex; Tokenizer encoding
// takes `&self` and is thread-safe.
unsafe impl Send for OnnxClassifier {}
unsafe impl Sync for OnnxClassifier {}

impl OnnxClassifier {
    /// Load tokenizer and model. Any failure here is fatal for the process.
    pub fn load(cfg: &OnnxClassifierConfig) -> Result<Self> {
        let tokenizer_path = cfg.model_dir.join("tokenizer.json");
        let model_path = cfg.model_dir.join("model.onnx");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            Error::ModelLoad(format!(
                "failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            ))
        })?;
        configure_fixed_length(&mut tokenizer, MAX_SEQ_LEN)?;

        let session = load_session(&model_path, cfg.intra_threads)?;

        tracing::info!(
            model = %model_path.display(),
            intra_threads = cfg.intra_threads,
            token_type_ids = cfg.use_token_type_ids,
            "classifier model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            use_token_type_ids: cfg.use_token_type_ids,
        })
    }

    fn encode(&self, text: &str) -> std::result::Result<EncodedInput, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Tokenization(e.to_string()))?;

        let to_i64 = |xs: &[u32]| xs.iter().map(|&x| x as i64).collect::<Vec<_>>();
        let input_ids = to_i64(encoding.get_ids());
        let attention_mask = to_i64(encoding.get_attention_mask());
        let token_type_ids = to_i64(encoding.get_type_ids());

        if input_ids.len() != MAX_SEQ_LEN {
            return Err(InferenceError::Tokenization(format!(
                "expected {MAX_SEQ_LEN} tokens, got {}",
                input_ids.len()
            )));
        }

        let shape = |v: Vec<i64>| {
            Array2::from_shape_vec((1, MAX_SEQ_LEN), v)
                .map_err(|e| InferenceError::Tokenization(format!("bad input shape: {e}")))
        };

        Ok(EncodedInput {
            input_ids: shape(input_ids)?,
            attention_mask: shape(attention_mask)?,
            token_type_ids: shape(token_type_ids)?,
        })
    }

    fn logits(&self, input: &EncodedInput) -> std::result::Result<Vec<f32>, InferenceError> {
        let input_ids = TensorRef::from_array_view(&input.input_ids)
            .map_err(|e| runtime_err("input_ids tensor", e))?;
        let attention_mask = TensorRef::from_array_view(&input.attention_mask)
            .map_err(|e| runtime_err("attention_mask tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Runtime(format!("session lock poisoned: {e}")))?;

        let outputs = if self.use_token_type_ids {
            let token_type_ids = TensorRef::from_array_view(&input.token_type_ids)
                .map_err(|e| runtime_err("token_type_ids tensor", e))?;
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            ])
        } else {
            session.run(ort::inputs![
                "input_ids" => input_ids,
                "attention_mask" => attention_mask
            ])
        }
        .map_err(|e| runtime_err("session run", e))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| runtime_err("extract logits", e))?;

        let dims: Vec<i64> = shape.iter().copied().collect();
        if dims.len() != 2 || dims[0] != 1 {
            return Err(InferenceError::UnexpectedOutput(format!(
                "logits shape {dims:?}, expected [1, {NUM_LABELS}]"
            )));
        }

        Ok(data.to_vec())
    }
}

fn runtime_err(what: &str, e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Runtime(format!("{what}: {e}"))
}

struct EncodedInput {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn classify(&self, text: &str) -> std::result::Result<Label, InferenceError> {
        let input = self.encode(text)?;
        let logits = self.logits(&input)?;
        label_from_logits(&logits)
    }
}

fn load_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    let load_err = |what: &str, e: String| Error::ModelLoad(format!("{what}: {e}"));

    Session::builder()
        .map_err(|e| load_err("failed to create ONNX session builder", e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| load_err("failed to set optimization level", e.to_string()))?
        .with_intra_threads(intra_threads)
        .map_err(|e| load_err("failed to set thread count", e.to_string()))?
        .commit_from_file(model_path)
        .map_err(|e| {
            load_err(
                &format!("failed to load ONNX model from {}", model_path.display()),
                e.to_string(),
            )
        })
}

/// Force every encoding to exactly `len` tokens.
///
/// Keeps the pad token/id and truncation strategy from `tokenizer.json` when
/// it defines them; only the length is overridden. Without padding settings
/// the pad token is taken from the vocabulary (`<pad>` for RoBERTa-style
/// vocabularies, `[PAD]` for BERT-style ones).
pub fn configure_fixed_length(tokenizer: &mut Tokenizer, len: usize) -> Result<()> {
    let mut truncation = tokenizer.get_truncation().cloned().unwrap_or_default();
    truncation.max_length = len;
    tokenizer
        .with_truncation(Some(truncation))
        .map_err(|e| Error::ModelLoad(format!("invalid truncation settings: {e}")))?;

    let mut padding = match tokenizer.get_padding() {
        Some(p) => p.clone(),
        None => default_padding(tokenizer),
    };
    padding.strategy = PaddingStrategy::Fixed(len);
    tokenizer.with_padding(Some(padding));

    Ok(())
}

fn default_padding(tokenizer: &Tokenizer) -> PaddingParams {
    let mut padding = PaddingParams::default();
    if let Some((token, id)) = ["<pad>", "[PAD]"]
        .into_iter()
        .find_map(|t| tokenizer.token_to_id(t).map(|id| (t, id)))
    {
        padding.pad_token = token.to_string();
        padding.pad_id = id;
    }
    padding
}

/// Argmax over the class logits of a binary model.
///
/// Index 1 is `Disaster`, index 0 is `NoDisaster`. Any other class count or a
/// non-finite score is reported as an error instead of being mapped to a label.
pub fn label_from_logits(logits: &[f32]) -> std::result::Result<Label, InferenceError> {
    if logits.len() != NUM_LABELS {
        return Err(InferenceError::UnexpectedOutput(format!(
            "expected {NUM_LABELS} class scores, got {}",
            logits.len()
        )));
    }
    if let Some(bad) = logits.iter().find(|x| !x.is_finite()) {
        return Err(InferenceError::UnexpectedOutput(format!(
            "non-finite class score {bad}"
        )));
    }

    let mut best = 0usize;
    for (i, &score) in logits.iter().enumerate() {
        if score > logits[best] {
            best = i;
        }
    }

    Label::from_class_index(best)
        .ok_or_else(|| InferenceError::UnexpectedOutput(format!("class index {best}")))
}
