//! Content-address keys for (source video, model) pairs.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use fungen_signal_model::ModelRef;

use crate::error::CacheError;

/// Bytes from the start of the source mixed into the digest.
const HEAD_SAMPLE_BYTES: u64 = 64 * 1024;

const FINGERPRINT_DOMAIN: &[u8] = b"fungen-fingerprint-v1";

/// Stable key for one source video under one model.
///
/// Two fingerprints are equal exactly when the canonical source path, its
/// size, modification time, leading bytes and the model identity all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    digest: String,
    source: PathBuf,
    stem: String,
    model: String,
}

impl Fingerprint {
    /// Fingerprint `source` for `model`.
    ///
    /// Fails with [`CacheError::Source`] when the source cannot be read.
    pub fn resolve(source: &Path, model: &ModelRef) -> Result<Self, CacheError> {
        let source_err = |e: std::io::Error| CacheError::Source {
            path: source.to_path_buf(),
            source: e,
        };

        let canonical = source.canonicalize().map_err(source_err)?;
        let meta = std::fs::metadata(&canonical).map_err(source_err)?;
        if !meta.is_file() {
            return Err(source_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }
        let mtime_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        let mut head = Vec::new();
        File::open(&canonical)
            .and_then(|f| f.take(HEAD_SAMPLE_BYTES).read_to_end(&mut head))
            .map_err(source_err)?;

        let mut hasher = Sha256::new();
        hasher.update(FINGERPRINT_DOMAIN);
        for part in [
            canonical.to_string_lossy().as_bytes(),
            meta.len().to_le_bytes().as_slice(),
            mtime_ns.to_le_bytes().as_slice(),
            head.as_slice(),
            model.identity().as_bytes(),
        ] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        let digest = format!("{:x}", hasher.finalize());

        let stem = canonical
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "source".to_string());

        Ok(Self {
            digest,
            source: canonical,
            stem,
            model: model.name.clone(),
        })
    }

    /// Full hex SHA-256 digest.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// First 12 hex digits, used in file names and logs.
    pub fn short(&self) -> &str {
        &self.digest[..12]
    }

    /// Canonical source path.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Source file stem.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Model name.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}
