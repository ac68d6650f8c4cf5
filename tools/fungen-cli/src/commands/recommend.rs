//! Suggest post-processing options for a video.

use std::path::PathBuf;
use std::sync::Arc;

use fungen_common::AppConfig;
use fungen_job_queue::{CommandInferenceEngine, FungenService};
use fungen_signal_model::OptionKey;

use super::options::ModelArgs;

pub async fn run(config: &AppConfig, path: PathBuf, model: ModelArgs, json: bool) -> anyhow::Result<()> {
    let model = model.model_ref();
    let engine = Arc::new(CommandInferenceEngine::new(config.inference.clone()));
    let service = FungenService::start(config, engine);

    let result = service.recommend(&path, &model).await;
    service.shutdown().await;
    let result = result.map_err(|e| anyhow::anyhow!("Recommendation failed: {e}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Recommendations for {}:", path.display());
    if result.is_empty() {
        println!("  (none)");
    }
    for key in OptionKey::ALL {
        if let Some(value) = result.get(key) {
            println!("  {:<28} {value}", key.label());
        }
    }
    if !result.reasoning.is_empty() {
        println!("\n{}", result.reasoning);
    }
    Ok(())
}
