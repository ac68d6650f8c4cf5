//! Funscript artifact: timed position actions plus provenance.
//!
//! The on-disk layout follows the common funscript JSON shape
//! (`version`, `inverted`, `range`, `actions`) with an extra `generator`
//! block so a viewer can reload and re-render the result without
//! re-running the pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::options::PostprocessOptions;

pub const GENERATOR_NAME: &str = "fungen";
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum position value.
pub const POSITION_RANGE: u8 = 100;

/// A single timed position command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Milliseconds from the start of the video.
    pub at: u64,
    /// Position in `[0, 100]`.
    pub pos: u8,
}

impl Action {
    pub fn new(at: u64, pos: u8) -> Self {
        Self { at, pos }
    }
}

/// Provenance block written alongside the actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    pub name: String,
    pub version: String,
    /// Source video path.
    pub source: String,
    /// Model name used for inference.
    pub model: String,
    /// Cache fingerprint of the (source, model) pair.
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Frame rate of the raw signal.
    pub frame_rate: f64,
    /// Options the pipeline ran with.
    pub options: PostprocessOptions,
}

impl GeneratorInfo {
    pub fn new(
        source: impl Into<String>,
        model: impl Into<String>,
        frame_rate: f64,
        options: PostprocessOptions,
    ) -> Self {
        Self {
            name: GENERATOR_NAME.to_string(),
            version: GENERATOR_VERSION.to_string(),
            source: source.into(),
            model: model.into(),
            fingerprint: None,
            frame_rate,
            options,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }
}

/// Top-level funscript file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funscript {
    pub version: String,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default = "default_range")]
    pub range: u8,
    pub actions: Vec<Action>,
    pub generator: GeneratorInfo,
}

fn default_range() -> u8 {
    POSITION_RANGE
}

impl Funscript {
    pub fn new(actions: Vec<Action>, generator: GeneratorInfo) -> Self {
        Self {
            version: "1.0".to_string(),
            inverted: false,
            range: POSITION_RANGE,
            actions,
            generator,
        }
    }

    /// Check positions are in range and timestamps strictly increase.
    pub fn validate(&self) -> Result<(), FunscriptError> {
        if let Some(bad) = self.actions.iter().find(|a| a.pos > POSITION_RANGE) {
            return Err(FunscriptError::Invalid {
                message: format!("position {} at {}ms exceeds {POSITION_RANGE}", bad.pos, bad.at),
            });
        }
        if let Some(pair) = self.actions.windows(2).find(|w| w[1].at <= w[0].at) {
            return Err(FunscriptError::Invalid {
                message: format!(
                    "timestamps not strictly increasing: {}ms then {}ms",
                    pair[0].at, pair[1].at
                ),
            });
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load and validate a funscript file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FunscriptError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| FunscriptError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let script: Funscript =
            serde_json::from_str(&json).map_err(|e| FunscriptError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        script.validate()?;
        Ok(script)
    }

    /// Write the funscript as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FunscriptError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FunscriptError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = self
            .to_json_pretty()
            .map_err(|e| FunscriptError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        std::fs::write(path, json).map_err(|e| FunscriptError::IoError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Summary statistics over the action list.
    pub fn stats(&self) -> FunscriptStats {
        FunscriptStats::from_actions(&self.actions)
    }
}

/// Descriptive statistics of an action sequence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FunscriptStats {
    pub total_actions: usize,
    pub duration_ms: u64,
    pub actions_per_second: f64,
    pub avg_interval_ms: f64,
    pub avg_position_change: f64,
    /// Share of positions at or below 10 or at or above 90.
    pub extreme_positions_ratio: f64,
    /// Share of positions within `[40, 60]`.
    pub center_positions_ratio: f64,
}

impl FunscriptStats {
    pub fn from_actions(actions: &[Action]) -> Self {
        let (Some(first), Some(last)) = (actions.first(), actions.last()) else {
            return Self::default();
        };

        let duration_ms = last.at.saturating_sub(first.at);
        let pairs = actions.len().saturating_sub(1);
        let (interval_sum, change_sum) =
            actions
                .windows(2)
                .fold((0u64, 0u64), |(intervals, changes), w| {
                    (
                        intervals + w[1].at.saturating_sub(w[0].at),
                        changes + w[1].pos.abs_diff(w[0].pos) as u64,
                    )
                });
        let count = actions.len() as f64;
        let extreme = actions.iter().filter(|a| a.pos <= 10 || a.pos >= 90).count();
        let center = actions
            .iter()
            .filter(|a| (40..=60).contains(&a.pos))
            .count();

        Self {
            total_actions: actions.len(),
            duration_ms,
            actions_per_second: if duration_ms > 0 {
                count / (duration_ms as f64 / 1000.0)
            } else {
                0.0
            },
            avg_interval_ms: if pairs > 0 {
                interval_sum as f64 / pairs as f64
            } else {
                0.0
            },
            avg_position_change: if pairs > 0 {
                change_sum as f64 / pairs as f64
            } else {
                0.0
            },
            extreme_positions_ratio: extreme as f64 / count,
            center_positions_ratio: center as f64 / count,
        }
    }
}

/// Errors that can occur when reading or writing funscripts.
#[derive(Debug, thiserror::Error)]
pub enum FunscriptError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid funscript: {message}")]
    Invalid { message: String },
}
