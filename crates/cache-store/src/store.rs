//! Artifact locations, cache lookups and atomic writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fungen_common::CacheConfig;
use fungen_signal_model::{Funscript, RawSignal};

use crate::error::CacheError;
use crate::fingerprint::Fingerprint;
use crate::tabular::{self, SignalHeader};

/// Extension of raw-signal files.
pub const SIGNAL_EXTENSION: &str = "csv";

/// Extension of funscript files.
pub const FUNSCRIPT_EXTENSION: &str = "funscript";

/// A raw signal read back from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSignal {
    pub signal: RawSignal,
    pub path: PathBuf,
}

/// Maps fingerprints to artifact paths and guards writes to them.
///
/// Reads take no lock. Writes to the same artifact are serialized and
/// land through a temporary file plus rename, so readers never observe a
/// half-written artifact.
#[derive(Debug, Default)]
pub struct CacheStore {
    cache_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    default_fps: Option<f64>,
    write_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl CacheStore {
    /// `None` directories place artifacts next to the source video.
    pub fn new(cache_dir: Option<PathBuf>, output_dir: Option<PathBuf>) -> Self {
        Self {
            cache_dir,
            output_dir,
            default_fps: None,
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.output_dir.clone())
    }

    /// Frame rate assumed for signal files that record none.
    pub fn with_default_fps(mut self, fps: f64) -> Self {
        self.default_fps = Some(fps);
        self
    }

    /// Raw-signal path: `<stem>.<model>.csv` beside the video, or
    /// `<stem>.<model>.<short digest>.csv` in a shared cache directory.
    pub fn signal_path(&self, fp: &Fingerprint) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.join(format!(
                "{}.{}.{}.{SIGNAL_EXTENSION}",
                fp.stem(),
                fp.model(),
                fp.short()
            )),
            None => source_dir(fp).join(format!("{}.{}.{SIGNAL_EXTENSION}", fp.stem(), fp.model())),
        }
    }

    /// Funscript path: `<stem>.funscript` in the output directory or beside the video.
    pub fn funscript_path(&self, fp: &Fingerprint) -> PathBuf {
        let dir = self
            .output_dir
            .clone()
            .unwrap_or_else(|| source_dir(fp));
        dir.join(format!("{}.{FUNSCRIPT_EXTENSION}", fp.stem()))
    }

    /// Look up the cached raw signal for `fp`.
    ///
    /// Side-effect free. A missing file is a miss; an unreadable file or
    /// one recorded under another fingerprint is logged and also a miss.
    pub fn lookup(&self, fp: &Fingerprint) -> Option<CachedSignal> {
        match self.load_signal(fp) {
            Ok(Some(cached)) => {
                tracing::debug!(fingerprint = %fp, path = %cached.path.display(), "Cache hit");
                Some(cached)
            }
            Ok(None) => {
                tracing::debug!(fingerprint = %fp, "Cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(fingerprint = %fp, error = %e, "Ignoring unreadable cached signal");
                None
            }
        }
    }

    /// Read the cached signal, reporting corruption as an error.
    pub fn load_signal(&self, fp: &Fingerprint) -> Result<Option<CachedSignal>, CacheError> {
        let path = self.signal_path(fp);
        if !path.is_file() {
            return Ok(None);
        }
        let (header, signal) =
            tabular::read_signal(&path, self.default_fps.unwrap_or(DEFAULT_FPS))?;
        if let Some(recorded) = &header.fingerprint {
            if recorded != fp.digest() {
                tracing::debug!(
                    fingerprint = %fp,
                    path = %path.display(),
                    "Cached signal belongs to a different source revision"
                );
                return Ok(None);
            }
        }
        if signal.is_empty() {
            return Err(CacheError::corrupt(&path, "no samples"));
        }
        for channel in signal.channels() {
            if let Some(frame) = channel.values.iter().position(|v| !v.is_finite()) {
                return Err(CacheError::corrupt(
                    &path,
                    format!("non-finite {} value at frame {frame}", channel.name),
                ));
            }
        }
        Ok(Some(CachedSignal { signal, path }))
    }

    /// Persist a raw signal for `fp`, replacing any previous one.
    pub fn store_signal(&self, fp: &Fingerprint, signal: &RawSignal) -> Result<PathBuf, CacheError> {
        let path = self.signal_path(fp);
        let header = SignalHeader {
            fingerprint: Some(fp.digest().to_string()),
            fps: Some(signal.fps()),
            model: Some(fp.model().to_string()),
        };
        self.write_atomic(&path, |partial| tabular::write_signal(partial, signal, &header))?;
        tracing::debug!(fingerprint = %fp, path = %path.display(), "Stored raw signal");
        Ok(path)
    }

    /// Persist a funscript for `fp`.
    pub fn store_funscript(&self, fp: &Fingerprint, script: &Funscript) -> Result<PathBuf, CacheError> {
        let path = self.funscript_path(fp);
        self.write_atomic(&path, |partial| Ok(script.save(partial)?))?;
        tracing::debug!(fingerprint = %fp, path = %path.display(), "Stored funscript");
        Ok(path)
    }

    /// Previously written funscript for `fp`, if one exists and is valid.
    pub fn load_funscript(&self, fp: &Fingerprint) -> Option<Funscript> {
        let path = self.funscript_path(fp);
        if !path.is_file() {
            return None;
        }
        match Funscript::load(&path) {
            Ok(script) => Some(script),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable funscript");
                None
            }
        }
    }

    fn write_atomic(
        &self,
        path: &Path,
        write: impl FnOnce(&Path) -> Result<(), CacheError>,
    ) -> Result<(), CacheError> {
        let lock = self.lock_for(path);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            replace_file(path, write)
        };
        self.release_lock(path, lock);
        result
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        let mut locks = lock_table(&self.write_locks);
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Drop the table entry once no other writer holds it.
    fn release_lock(&self, path: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = lock_table(&self.write_locks);
        drop(lock);
        if locks.get(path).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(path);
        }
    }
}

fn replace_file(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<(), CacheError>,
) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    }
    let partial = partial_path(path);
    if let Err(e) = write(&partial) {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    std::fs::rename(&partial, path).map_err(|e| {
        let _ = std::fs::remove_file(&partial);
        CacheError::io(path, e)
    })
}

const DEFAULT_FPS: f64 = 30.0;

fn lock_table(
    table: &Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
) -> MutexGuard<'_, HashMap<PathBuf, Arc<Mutex<()>>>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

fn source_dir(fp: &Fingerprint) -> PathBuf {
    fp.source()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.partial", std::process::id()))
}
