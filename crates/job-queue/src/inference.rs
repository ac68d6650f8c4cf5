//! The inference seam.
//!
//! Video decoding and model execution live outside this crate. The worker
//! talks to them through [`InferenceEngine`]; the stock implementation runs
//! a configured command that writes a raw-signal CSV.

use std::path::{Path, PathBuf};
use std::process::Command;

use fungen_cache::tabular::read_signal;
use fungen_common::{FungenError, InferenceConfig};
use fungen_signal_model::{ModelRef, RawSignal};
use uuid::Uuid;

/// Errors raised by an inference backend.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("unusable inference output: {0}")]
    Output(String),

    #[error("{0}")]
    Engine(String),
}

impl InferenceError {
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }
}

impl From<InferenceError> for FungenError {
    fn from(err: InferenceError) -> Self {
        FungenError::inference(err.to_string())
    }
}

/// Produces a [`RawSignal`] for one video under one model.
///
/// Called from a blocking thread while the accelerator gate is held.
/// `progress` takes a fraction in `[0, 1]`.
pub trait InferenceEngine: Send + Sync {
    fn infer(
        &self,
        video: &Path,
        model: &ModelRef,
        progress: &dyn Fn(f32),
    ) -> Result<RawSignal, InferenceError>;
}

/// Runs an external program built from [`InferenceConfig`].
#[derive(Debug, Clone)]
pub struct CommandInferenceEngine {
    config: InferenceConfig,
    scratch_dir: PathBuf,
}

impl CommandInferenceEngine {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Directory for the program's temporary output file.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    fn render_args(&self, video: &Path, model: &ModelRef, output: &Path) -> Vec<String> {
        let model_arg = model
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| model.name.clone());
        let video = video.display().to_string();
        let output = output.display().to_string();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{video}", &video)
                    .replace("{model}", &model_arg)
                    .replace("{output}", &output)
            })
            .collect()
    }
}

impl InferenceEngine for CommandInferenceEngine {
    fn infer(
        &self,
        video: &Path,
        model: &ModelRef,
        progress: &dyn Fn(f32),
    ) -> Result<RawSignal, InferenceError> {
        let program = self.config.program.display().to_string();
        let output = self
            .scratch_dir
            .join(format!("fungen-infer-{}.csv", Uuid::new_v4()));
        let args = self.render_args(video, model, &output);

        tracing::info!(program = %program, video = %video.display(), model = %model.name, "Running inference");
        progress(0.0);

        let result = Command::new(&self.config.program)
            .args(&args)
            .output()
            .map_err(|source| InferenceError::Launch {
                program: program.clone(),
                source,
            });
        let signal = result.and_then(|out| {
            if !out.status.success() {
                return Err(InferenceError::Failed {
                    program: program.clone(),
                    status: out.status.to_string(),
                    stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
                });
            }
            read_signal(&output, self.config.default_fps)
                .map(|(_, signal)| signal)
                .map_err(|e| InferenceError::Output(e.to_string()))
        });

        if let Err(e) = std::fs::remove_file(&output) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %output.display(), error = %e, "Failed to remove inference scratch file");
            }
        }

        let signal = signal?;
        if signal.is_empty() {
            return Err(InferenceError::Output(format!("{program} produced no samples")));
        }
        progress(1.0);
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_substituted() {
        let engine = CommandInferenceEngine::new(InferenceConfig::default());
        let args = engine.render_args(
            Path::new("/videos/a.mp4"),
            &ModelRef::named("conv_tcn"),
            Path::new("/tmp/out.csv"),
        );
        assert_eq!(
            args,
            vec![
                "--video",
                "/videos/a.mp4",
                "--model",
                "conv_tcn",
                "--output",
                "/tmp/out.csv"
            ]
        );
    }

    #[test]
    fn test_model_path_wins_over_name() {
        let engine = CommandInferenceEngine::new(InferenceConfig {
            args: vec!["{model}".to_string()],
            ..InferenceConfig::default()
        });
        let args = engine.render_args(
            Path::new("a.mp4"),
            &ModelRef::from_path("/models/tcn.onnx"),
            Path::new("o.csv"),
        );
        assert_eq!(args, vec!["/models/tcn.onnx"]);
    }

    #[test]
    fn test_missing_program_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandInferenceEngine::new(InferenceConfig {
            program: dir.path().join("no-such-program"),
            ..InferenceConfig::default()
        })
        .with_scratch_dir(dir.path());

        let err = engine
            .infer(Path::new("a.mp4"), &ModelRef::named("m"), &|_| {})
            .unwrap_err();
        assert!(matches!(err, InferenceError::Launch { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_reads_signal_written_by_program() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandInferenceEngine::new(InferenceConfig {
            program: PathBuf::from("sh"),
            args: vec![
                "-c".to_string(),
                "printf 'predicted_change\\n0.1\\n0.9\\n0.2\\n' > {output}".to_string(),
            ],
            default_fps: 25.0,
        })
        .with_scratch_dir(dir.path());

        let signal = engine
            .infer(Path::new("a.mp4"), &ModelRef::named("m"), &|_| {})
            .unwrap();
        assert_eq!(signal.primary(), &[0.1, 0.9, 0.2]);
        assert_eq!(signal.fps(), 25.0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
