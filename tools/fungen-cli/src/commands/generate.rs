//! Queue videos and wait for their funscripts.

use std::path::PathBuf;
use std::sync::Arc;

use fungen_common::AppConfig;
use fungen_job_queue::{
    CommandInferenceEngine, EnqueueRequest, FungenService, JobStatus, SkipReason,
};

use super::options::{ModelArgs, OptionArgs};

pub async fn run(
    config: &AppConfig,
    paths: Vec<PathBuf>,
    model: ModelArgs,
    options: OptionArgs,
    force: bool,
    recommended: bool,
) -> anyhow::Result<()> {
    let options = options.resolve()?;
    let model = model.model_ref();
    let engine = Arc::new(CommandInferenceEngine::new(config.inference.clone()));
    let service = FungenService::start(config, engine);

    println!("Queueing {} file(s) with model {}", paths.len(), model.name);

    let mut job_ids = Vec::new();
    let mut skipped = Vec::new();
    for path in paths {
        let mut job_options = options.clone();
        if recommended {
            match service.recommend(&path, &model).await {
                Ok(result) => {
                    let applied = result.apply_all(&mut job_options)?;
                    println!("  {}: applied {applied} recommended option(s)", path.display());
                    if !result.reasoning.is_empty() {
                        println!("    {}", result.reasoning);
                    }
                }
                Err(e) => println!("  {}: no recommendation ({e})", path.display()),
            }
        }

        let request = EnqueueRequest::new(vec![path], model.clone())
            .with_options(job_options)
            .forced(force);
        let response = service.enqueue(&request);
        job_ids.extend(response.job_ids);
        skipped.extend(response.skipped);
    }

    for entry in &skipped {
        match &entry.reason {
            SkipReason::Duplicate { existing } => {
                println!("  Skipped {} (already queued as {existing})", entry.path.display())
            }
            SkipReason::Unsupported { message } => {
                println!("  Skipped {}: {message}", entry.path.display())
            }
            SkipReason::CacheHitReused { signal_path, .. } => println!(
                "  Reusing cached signal for {} ({})",
                entry.path.display(),
                signal_path.display()
            ),
        }
    }

    if job_ids.is_empty() {
        println!("\nNothing to do.");
        service.shutdown().await;
        return Ok(());
    }

    service.wait_idle().await;

    println!();
    let mut failures = 0;
    for id in &job_ids {
        let Some(job) = service.get(*id) else {
            continue;
        };
        match job.status {
            JobStatus::Completed => println!(
                "  done    {} -> {}",
                job.source_path.display(),
                job.funscript_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            ),
            JobStatus::Failed => {
                failures += 1;
                println!(
                    "  failed  {}: {}",
                    job.source_path.display(),
                    job.error.as_deref().unwrap_or("unknown error")
                );
            }
            other => println!("  {other:<7} {}", job.source_path.display()),
        }
    }

    service.shutdown().await;

    if failures > 0 {
        anyhow::bail!("{failures} of {} job(s) failed", job_ids.len());
    }
    println!("\nGeneration complete.");
    Ok(())
}
