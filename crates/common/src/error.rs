//! Error types shared across Fungen crates.
//!
//! Failures are always local to one job or one request: the queue worker
//! attaches them to the job record and carries on with the next job.

use std::path::PathBuf;

/// Top-level error type for Fungen operations.
#[derive(Debug, thiserror::Error)]
pub enum FungenError {
    /// Unreadable or unsupported source, reported per item at enqueue.
    #[error("Input error: {message}")]
    Input { message: String },

    /// A cached artifact could not be read. Treated as a cache miss.
    #[error("Corrupt cache artifact {path}: {message}")]
    CacheCorruption { path: PathBuf, message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Post-processing failed: {message}")]
    PostProcess { message: String },

    #[error("Recommendation failed: {message}")]
    Recommendation { message: String },

    #[error("Persist failed: {message}")]
    Persist { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using FungenError.
pub type FungenResult<T> = Result<T, FungenError>;

impl FungenError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    pub fn cache_corruption(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::CacheCorruption {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference {
            message: msg.into(),
        }
    }

    pub fn post_process(msg: impl Into<String>) -> Self {
        Self::PostProcess {
            message: msg.into(),
        }
    }

    pub fn recommendation(msg: impl Into<String>) -> Self {
        Self::Recommendation {
            message: msg.into(),
        }
    }

    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
