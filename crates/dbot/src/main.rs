use std::sync::Arc;

use dbot_onnx::{OnnxClassifier, OnnxClassifierConfig};

use dbot_core::{
    config::Config, pipeline::Pipeline, ports::Classifier, request_log::RequestLogger,
};

#[tokio::main]
async fn main() -> Result<(), dbot_core::Error> {
    dbot_core::logging::init("dbot")?;

    let cfg = Arc::new(Config::load()?);

    // No request can be served without the model; bail out before polling.
    let classifier: Arc<dyn Classifier> = match OnnxClassifier::load(&OnnxClassifierConfig {
        model_dir: cfg.model_dir.clone(),
        intra_threads: cfg.onnx_intra_threads,
        use_token_type_ids: cfg.model_uses_token_type_ids,
    }) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(model_dir = %cfg.model_dir.display(), error = %e, "failed to load model");
            return Err(e);
        }
    };
    tracing::info!(classifier = classifier.name(), "classifier ready");

    let pipeline = Arc::new(Pipeline::new(
        classifier,
        Arc::new(RequestLogger::new(cfg.log_dir.clone())),
        cfg.inference_timeout,
    ));

    dbot_telegram::router::run_polling(cfg, pipeline)
        .await
        .map_err(|e| dbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
