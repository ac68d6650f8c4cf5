//! Application configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FungenError, FungenResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where raw-signal caches and funscripts are written.
    pub cache: CacheConfig,

    /// Job queue behaviour.
    pub queue: QueueConfig,

    /// External inference command.
    pub inference: InferenceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Artifact locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory for raw-signal CSV files. `None` places them next to the video.
    pub cache_dir: Option<PathBuf>,

    /// Directory for funscript files. `None` places them next to the video.
    pub output_dir: Option<PathBuf>,
}

/// Queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Lowercase file extensions accepted at enqueue.
    pub video_extensions: Vec<String>,
}

/// Command template for the external inference step.
///
/// Arguments may contain the placeholders `{video}`, `{model}` and `{output}`.
/// The command must write a raw-signal CSV to `{output}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Program to execute.
    pub program: PathBuf,

    /// Argument template.
    pub args: Vec<String>,

    /// Frame rate assumed when the produced file carries no timestamps.
    pub default_fps: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "fungen=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            video_extensions: ["mp4", "mkv", "m4v", "avi", "mov", "webm", "wmv"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("fungen-infer"),
            args: vec![
                "--video".to_string(),
                "{video}".to_string(),
                "--model".to_string(),
                "{model}".to_string(),
                "--output".to_string(),
                "{output}".to_string(),
            ],
            default_fps: 30.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl QueueConfig {
    /// Whether `path` has one of the accepted video extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .is_some_and(|ext| self.video_extensions.iter().any(|known| *known == ext))
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_or_default(&config_file_path())
    }

    /// Load config from `path`, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Falling back to default config");
                Self::default()
            }
        }
    }

    /// Load config from an explicit file, failing on any error.
    pub fn load_from(path: &Path) -> FungenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|_| FungenError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        serde_json::from_str(&content)
            .map_err(|e| FungenError::config(format!("{}: {e}", path.display())))
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to `path` as pretty JSON.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("fungen").join("config.json")
}
