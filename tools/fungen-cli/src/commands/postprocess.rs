//! Run the pipeline on an existing raw-signal file.

use std::path::PathBuf;

use fungen_cache::tabular::read_signal;
use fungen_common::AppConfig;
use fungen_processing_core::PostProcessor;
use fungen_signal_model::{Funscript, GeneratorInfo};

use super::options::OptionArgs;

pub fn run(
    config: &AppConfig,
    input: PathBuf,
    output: Option<PathBuf>,
    fps: Option<f64>,
    options: OptionArgs,
) -> anyhow::Result<()> {
    let options = options.resolve()?;
    let default_fps = fps.unwrap_or(config.inference.default_fps);

    let (header, signal) = read_signal(&input, default_fps)
        .map_err(|e| anyhow::anyhow!("Failed to read raw signal: {e}"))?;
    println!(
        "Loaded {} samples x {} channel(s) at {} fps from {}",
        signal.sample_count(),
        signal.channel_count(),
        signal.fps(),
        input.display()
    );

    let processor = PostProcessor::new(options)?;
    let trace = processor.trace(&signal)?;
    println!("  Extrema: {}", trace.extrema.len());
    println!("  After merge: {}", trace.merged.len());
    println!("  Actions: {}", trace.actions.len());

    let mut generator = GeneratorInfo::new(
        input.display().to_string(),
        header.model.unwrap_or_default(),
        signal.fps(),
        processor.options().clone(),
    );
    generator.fingerprint = header.fingerprint;
    let script = Funscript::new(trace.actions, generator);

    let output = output.unwrap_or_else(|| input.with_extension("funscript"));
    script
        .save(&output)
        .map_err(|e| anyhow::anyhow!("Failed to write funscript: {e}"))?;
    println!("  Funscript saved to: {}", output.display());

    Ok(())
}
