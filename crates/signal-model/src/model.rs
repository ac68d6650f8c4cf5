//! Inference model references.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A selected inference model.
///
/// `name` is the stable identity used in artifact names and metadata; the
/// optional `path` lets identity include the model file's size and mtime so
/// swapping the weights invalidates cached signals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ModelRef {
    /// A model known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
        }
    }

    /// A model file; its name is the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            path: Some(path.to_path_buf()),
        }
    }

    /// Identity string hashed into cache fingerprints.
    pub fn identity(&self) -> String {
        let Some(path) = &self.path else {
            return self.name.clone();
        };
        match std::fs::metadata(path) {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                format!("{}:{}:{}", self.name, meta.len(), mtime)
            }
            Err(_) => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path_uses_stem() {
        let model = ModelRef::from_path("/models/conv_tcn_62.onnx");
        assert_eq!(model.name, "conv_tcn_62");
        assert_eq!(model.identity(), "conv_tcn_62");
    }

    #[test]
    fn test_identity_includes_file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.onnx");
        std::fs::write(&path, b"weights").unwrap();

        let model = ModelRef::from_path(&path);
        assert!(model.identity().starts_with("tiny:7:"));
    }
}
