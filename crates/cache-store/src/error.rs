//! Cache error types.

use std::path::PathBuf;

use fungen_common::FungenError;
use fungen_signal_model::FunscriptError;

/// Errors raised while fingerprinting sources or touching artifacts.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cannot read source {path}: {source}")]
    Source {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("corrupt artifact {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error(transparent)]
    Funscript(#[from] FunscriptError),
}

impl CacheError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<CacheError> for FungenError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Source { .. } => FungenError::input(err.to_string()),
            CacheError::Corrupt { ref path, ref message } => {
                FungenError::cache_corruption(path.clone(), message.clone())
            }
            CacheError::Io { .. } | CacheError::Funscript(_) => FungenError::persist(err.to_string()),
        }
    }
}
