//! In-memory job table and FIFO of pending work.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{watch, Notify};

use fungen_cache::{CacheStore, Fingerprint};
use fungen_signal_model::{ModelRef, PostprocessOptions, RawSignal};

use crate::job::{JobId, JobStatus, JobStatusView, StageError, VideoJob};

/// Videos to add under one model and one option set.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub paths: Vec<PathBuf>,
    pub model: ModelRef,
    pub options: PostprocessOptions,
    /// Ignore cached signals and run inference again.
    pub force: bool,
}

impl EnqueueRequest {
    pub fn new(paths: Vec<PathBuf>, model: ModelRef) -> Self {
        Self {
            paths,
            model,
            options: PostprocessOptions::default(),
            force: false,
        }
    }

    pub fn with_options(mut self, options: PostprocessOptions) -> Self {
        self.options = options;
        self
    }

    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Why an enqueued path did not go through the normal pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// An active job already covers the same (path, model) pair.
    Duplicate { existing: JobId },
    /// The path was rejected; no job was created.
    Unsupported { message: String },
    /// A job was created but inference is skipped in favour of a cached
    /// signal.
    CacheHitReused { job: JobId, signal_path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnqueueResponse {
    /// Number of jobs created, including cache-hit jobs.
    pub added: usize,
    pub job_ids: Vec<JobId>,
    pub skipped: Vec<SkippedEntry>,
}

/// A job handed to the worker.
#[derive(Debug)]
pub struct Claim {
    pub job: VideoJob,
    /// Signal attached at enqueue when the job started from the cache.
    pub cached: Option<(Fingerprint, RawSignal)>,
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("unknown job {0}")]
    UnknownJob(JobId),

    #[error("job {id} cannot move from {from} to {to}")]
    Invalid {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },
}

struct Entry {
    job: VideoJob,
    cached: Option<(Fingerprint, RawSignal)>,
    cancel_requested: bool,
}

#[derive(Default)]
struct QueueState {
    order: Vec<JobId>,
    entries: HashMap<JobId, Entry>,
    pending: VecDeque<JobId>,
}

impl QueueState {
    fn active_duplicate(&self, source: &Path, model: &str) -> Option<JobId> {
        self.order.iter().copied().find(|id| {
            self.entries.get(id).is_some_and(|e| {
                e.job.status.is_active() && e.job.source_path == source && e.job.model.name == model
            })
        })
    }

    fn transition(&mut self, id: JobId, next: JobStatus) -> Result<&mut Entry, TransitionError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(TransitionError::UnknownJob(id))?;
        let from = entry.job.status;
        if !from.can_transition_to(next) {
            return Err(TransitionError::Invalid { id, from, to: next });
        }
        entry.job.status = next;
        if next.is_terminal() {
            entry.job.finished_at = Some(Utc::now());
            entry.cached = None;
        } else {
            entry.job.progress = entry.job.progress.max(next.base_progress());
        }
        if next == JobStatus::Completed {
            entry.job.progress = 1.0;
        }
        tracing::info!(job = %id, from = %from, to = %next, "Job status changed");
        Ok(entry)
    }
}

/// Shared job table.
///
/// All state sits behind one mutex that is never held across I/O or an
/// await point. `Notify` wakes the worker when work arrives; the watch
/// channel carries a revision counter for observers waiting on progress.
pub struct JobQueue {
    state: Mutex<QueueState>,
    work: Notify,
    revision: watch::Sender<u64>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Mutex::new(QueueState::default()),
            work: Notify::new(),
            revision,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
    }

    /// Add each path as a job.
    ///
    /// Paths with an unsupported extension or an unreadable source are
    /// skipped individually. When a valid cached signal exists and `force`
    /// is off, the job starts in `PostProcessing` with that signal.
    pub fn enqueue(
        &self,
        request: &EnqueueRequest,
        cache: &CacheStore,
        accepts: impl Fn(&Path) -> bool,
    ) -> EnqueueResponse {
        let mut response = EnqueueResponse::default();

        for path in &request.paths {
            let skip = |reason| SkippedEntry {
                path: path.clone(),
                reason,
            };
            if !accepts(path) {
                tracing::warn!(path = %path.display(), "Skipping unsupported file type");
                response.skipped.push(skip(SkipReason::Unsupported {
                    message: "unsupported file extension".to_string(),
                }));
                continue;
            }
            let fingerprint = match Fingerprint::resolve(path, &request.model) {
                Ok(fp) => fp,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable source");
                    response.skipped.push(skip(SkipReason::Unsupported {
                        message: e.to_string(),
                    }));
                    continue;
                }
            };

            if let Some(existing) = self
                .lock()
                .active_duplicate(fingerprint.source(), &request.model.name)
            {
                tracing::info!(path = %path.display(), existing = %existing, "Skipping duplicate job");
                response.skipped.push(skip(SkipReason::Duplicate { existing }));
                continue;
            }

            let cached = if request.force {
                None
            } else {
                cache.lookup(&fingerprint)
            };

            let mut job = VideoJob::new(
                fingerprint.source().to_path_buf(),
                request.model.clone(),
                request.options.clone(),
            );
            job.force = request.force;
            job.fingerprint = Some(fingerprint.digest().to_string());
            let id = job.id;

            let mut hit = None;
            let entry = match cached {
                Some(found) => {
                    job.status = JobStatus::PostProcessing;
                    job.progress = JobStatus::PostProcessing.base_progress();
                    job.reused_signal = true;
                    job.signal_path = Some(found.path.clone());
                    hit = Some(found.path);
                    Entry {
                        job,
                        cached: Some((fingerprint, found.signal)),
                        cancel_requested: false,
                    }
                }
                None => Entry {
                    job,
                    cached: None,
                    cancel_requested: false,
                },
            };

            {
                let mut state = self.lock();
                // Re-checked under the lock: the cache lookup ran unlocked.
                if let Some(existing) =
                    state.active_duplicate(&entry.job.source_path, &request.model.name)
                {
                    response.skipped.push(skip(SkipReason::Duplicate { existing }));
                    continue;
                }
                state.order.push(id);
                state.entries.insert(id, entry);
                state.pending.push_back(id);
            }

            match hit {
                Some(signal_path) => {
                    tracing::info!(job = %id, path = %path.display(), "Reusing cached signal");
                    response.skipped.push(skip(SkipReason::CacheHitReused {
                        job: id,
                        signal_path,
                    }));
                }
                None => tracing::info!(job = %id, path = %path.display(), "Job queued"),
            }
            response.added += 1;
            response.job_ids.push(id);
            self.work.notify_one();
        }

        if response.added > 0 {
            self.bump();
        }
        response
    }

    /// Claim the oldest pending job.
    ///
    /// A `Queued` job moves to `Resolving`; a job that started from the
    /// cache is handed over in `PostProcessing` together with its signal.
    pub fn take_next(&self) -> Option<Claim> {
        let claim = {
            let mut state = self.lock();
            loop {
                let id = state.pending.pop_front()?;
                let status = match state.entries.get(&id) {
                    Some(entry) => entry.job.status,
                    None => continue,
                };
                match status {
                    JobStatus::Queued => {
                        let Ok(entry) = state.transition(id, JobStatus::Resolving) else {
                            continue;
                        };
                        entry.job.started_at = Some(Utc::now());
                        break Claim {
                            job: entry.job.clone(),
                            cached: None,
                        };
                    }
                    JobStatus::PostProcessing => {
                        let Some(entry) = state.entries.get_mut(&id) else {
                            continue;
                        };
                        entry.job.started_at = Some(Utc::now());
                        break Claim {
                            job: entry.job.clone(),
                            cached: entry.cached.take(),
                        };
                    }
                    // Cancelled while waiting.
                    _ => continue,
                }
            }
        };
        self.bump();
        Some(claim)
    }

    /// Move a job to `next` if the state machine allows it.
    pub fn transition(&self, id: JobId, next: JobStatus) -> Result<(), TransitionError> {
        let result = self.lock().transition(id, next).map(|_| ());
        match &result {
            Ok(()) => self.bump(),
            Err(e) => tracing::warn!(error = %e, "Rejected job transition"),
        }
        result
    }

    /// Stage boundary: honour a pending cancel, otherwise move to `next`.
    ///
    /// Returns `Ok(false)` when the job was cancelled instead.
    pub fn advance(&self, id: JobId, next: JobStatus) -> Result<bool, TransitionError> {
        let result = {
            let mut state = self.lock();
            let cancel = state
                .entries
                .get(&id)
                .ok_or(TransitionError::UnknownJob(id))?
                .cancel_requested;
            if cancel {
                state.transition(id, JobStatus::Cancelled).map(|_| false)
            } else {
                state.transition(id, next).map(|_| true)
            }
        };
        if result.is_ok() {
            self.bump();
        }
        result
    }

    /// Request cancellation.
    ///
    /// A queued job is cancelled at once. A resolving or inferring job is
    /// flagged and stops at its next stage boundary. Returns `false` when
    /// the job is unknown or past the point of cancellation.
    pub fn cancel(&self, id: JobId) -> bool {
        let cancelled = {
            let mut state = self.lock();
            let Some(status) = state.entries.get(&id).map(|e| e.job.status) else {
                return false;
            };
            match status {
                JobStatus::Queued => state.transition(id, JobStatus::Cancelled).is_ok(),
                JobStatus::Resolving | JobStatus::Inferring => {
                    if let Some(entry) = state.entries.get_mut(&id) {
                        entry.cancel_requested = true;
                    }
                    tracing::info!(job = %id, "Cancellation requested");
                    true
                }
                _ => false,
            }
        };
        if cancelled {
            self.bump();
        }
        cancelled
    }

    /// Report progress within the current stage. Never moves backwards.
    pub fn set_progress(&self, id: JobId, progress: f32) {
        if let Some(entry) = self.lock().entries.get_mut(&id) {
            if entry.job.status.is_active() {
                entry.job.progress = entry.job.progress.max(progress.clamp(0.0, 1.0));
            }
        }
        self.bump();
    }

    /// Record the resolved fingerprint and cached signal location.
    pub fn set_resolved(&self, id: JobId, fingerprint: &Fingerprint, signal_path: Option<PathBuf>) {
        if let Some(entry) = self.lock().entries.get_mut(&id) {
            entry.job.fingerprint = Some(fingerprint.digest().to_string());
            entry.job.reused_signal = signal_path.is_some();
            if signal_path.is_some() {
                entry.job.signal_path = signal_path;
            }
        }
    }

    pub fn set_signal_path(&self, id: JobId, path: PathBuf) {
        if let Some(entry) = self.lock().entries.get_mut(&id) {
            entry.job.signal_path = Some(path);
        }
    }

    /// Mark a job completed with its funscript location.
    pub fn complete(&self, id: JobId, funscript_path: PathBuf) -> Result<(), TransitionError> {
        let result = self
            .lock()
            .transition(id, JobStatus::Completed)
            .map(|entry| entry.job.funscript_path = Some(funscript_path));
        if result.is_ok() {
            self.bump();
        }
        result
    }

    /// Mark a job failed, keeping the stage-qualified message.
    pub fn fail(&self, id: JobId, error: &StageError) {
        let result = self
            .lock()
            .transition(id, JobStatus::Failed)
            .map(|entry| entry.job.error = Some(error.to_string()));
        match result {
            Ok(()) => {
                tracing::error!(job = %id, stage = %error.stage, error = %error.message, "Job failed");
                self.bump();
            }
            Err(e) => tracing::warn!(error = %e, "Could not record job failure"),
        }
    }

    /// Snapshot of every job in insertion order.
    pub fn status(&self) -> Vec<JobStatusView> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.entries.get(id))
            .map(|entry| JobStatusView::from(&entry.job))
            .collect()
    }

    pub fn get(&self, id: JobId) -> Option<VideoJob> {
        self.lock().entries.get(&id).map(|e| e.job.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any job is still in a non-terminal state.
    pub fn has_active(&self) -> bool {
        self.lock()
            .entries
            .values()
            .any(|e| e.job.status.is_active())
    }

    /// Resolves once work may be available.
    pub async fn work_available(&self) {
        self.work.notified().await
    }

    /// Wake an idle worker without adding work.
    pub fn wake(&self) {
        self.work.notify_one();
    }

    /// Receiver that changes whenever any job changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Stage;

    struct Fixture {
        _dir: tempfile::TempDir,
        video: PathBuf,
        cache: CacheStore,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let cache = CacheStore::new(Some(dir.path().join("cache")), None);
        Fixture {
            _dir: dir,
            video,
            cache,
        }
    }

    fn request(path: &Path) -> EnqueueRequest {
        EnqueueRequest::new(vec![path.to_path_buf()], ModelRef::named("conv_tcn"))
    }

    fn accept_all(_: &Path) -> bool {
        true
    }

    #[test]
    fn test_enqueue_and_claim_in_order() {
        let fx = fixture();
        let second = fx.video.with_file_name("other.mp4");
        std::fs::write(&second, b"second").unwrap();
        let queue = JobQueue::new();

        let mut req = request(&fx.video);
        req.paths.push(second);
        let response = queue.enqueue(&req, &fx.cache, accept_all);
        assert_eq!(response.added, 2);
        assert!(response.skipped.is_empty());

        let first = queue.take_next().unwrap();
        assert_eq!(first.job.id, response.job_ids[0]);
        assert_eq!(first.job.status, JobStatus::Resolving);
        assert!(first.cached.is_none());
        assert_eq!(queue.take_next().unwrap().job.id, response.job_ids[1]);
        assert!(queue.take_next().is_none());
    }

    #[test]
    fn test_duplicate_pair_is_skipped() {
        let fx = fixture();
        let queue = JobQueue::new();
        let first = queue.enqueue(&request(&fx.video), &fx.cache, accept_all);

        let again = queue.enqueue(&request(&fx.video), &fx.cache, accept_all);
        assert_eq!(again.added, 0);
        assert_eq!(
            again.skipped[0].reason,
            SkipReason::Duplicate {
                existing: first.job_ids[0]
            }
        );
        assert_eq!(queue.len(), 1);

        // Another model is a different pair.
        let mut other = request(&fx.video);
        other.model = ModelRef::named("other_model");
        assert_eq!(queue.enqueue(&other, &fx.cache, accept_all).added, 1);
    }

    #[test]
    fn test_unsupported_and_missing_paths_are_skipped_per_item() {
        let fx = fixture();
        let queue = JobQueue::new();
        let mut req = request(&fx.video);
        req.paths.push(fx.video.with_file_name("missing.mp4"));
        req.paths.push(fx.video.with_file_name("notes.txt"));

        let response = queue.enqueue(&req, &fx.cache, |p| {
            p.extension().is_some_and(|e| e == "mp4")
        });
        assert_eq!(response.added, 1);
        assert_eq!(response.skipped.len(), 2);
        assert!(response
            .skipped
            .iter()
            .all(|s| matches!(s.reason, SkipReason::Unsupported { .. })));
    }

    #[test]
    fn test_cached_signal_starts_in_post_processing() {
        let fx = fixture();
        let model = ModelRef::named("conv_tcn");
        let fp = Fingerprint::resolve(&fx.video, &model).unwrap();
        let signal = RawSignal::from_values(30.0, vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        fx.cache.store_signal(&fp, &signal).unwrap();

        let queue = JobQueue::new();
        let response = queue.enqueue(&request(&fx.video), &fx.cache, accept_all);
        assert_eq!(response.added, 1);
        assert!(matches!(
            response.skipped[0].reason,
            SkipReason::CacheHitReused { .. }
        ));

        let claim = queue.take_next().unwrap();
        assert_eq!(claim.job.status, JobStatus::PostProcessing);
        assert!(claim.job.reused_signal);
        let (cached_fp, cached_signal) = claim.cached.unwrap();
        assert_eq!(cached_fp, fp);
        assert_eq!(cached_signal.primary(), signal.primary());

        // Forced requests ignore the cache.
        queue.complete(claim.job.id, PathBuf::from("x.funscript")).unwrap();
        let forced = queue.enqueue(&request(&fx.video).forced(true), &fx.cache, accept_all);
        assert!(forced.skipped.is_empty());
        assert_eq!(queue.take_next().unwrap().job.status, JobStatus::Resolving);
    }

    #[test]
    fn test_cancel_queued_job_is_immediate() {
        let fx = fixture();
        let queue = JobQueue::new();
        let id = queue.enqueue(&request(&fx.video), &fx.cache, accept_all).job_ids[0];

        assert!(queue.cancel(id));
        assert_eq!(queue.get(id).unwrap().status, JobStatus::Cancelled);
        assert!(queue.take_next().is_none());
        assert!(!queue.has_active());
    }

    #[test]
    fn test_cancel_running_job_applies_at_boundary() {
        let fx = fixture();
        let queue = JobQueue::new();
        let id = queue.enqueue(&request(&fx.video), &fx.cache, accept_all).job_ids[0];
        queue.take_next().unwrap();

        assert!(queue.cancel(id));
        assert_eq!(queue.get(id).unwrap().status, JobStatus::Resolving);
        assert!(!queue.advance(id, JobStatus::Inferring).unwrap());
        assert_eq!(queue.get(id).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_cancel_refused_after_inference() {
        let fx = fixture();
        let queue = JobQueue::new();
        let id = queue.enqueue(&request(&fx.video), &fx.cache, accept_all).job_ids[0];
        queue.take_next().unwrap();
        assert!(queue.advance(id, JobStatus::Inferring).unwrap());
        assert!(queue.advance(id, JobStatus::PostProcessing).unwrap());

        assert!(!queue.cancel(id));
        assert!(!queue.cancel(JobId::new()));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let fx = fixture();
        let queue = JobQueue::new();
        let id = queue.enqueue(&request(&fx.video), &fx.cache, accept_all).job_ids[0];

        let err = queue.transition(id, JobStatus::Completed).unwrap_err();
        assert_eq!(
            err,
            TransitionError::Invalid {
                id,
                from: JobStatus::Queued,
                to: JobStatus::Completed
            }
        );
        assert_eq!(queue.get(id).unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn test_failure_frees_the_pair() {
        let fx = fixture();
        let queue = JobQueue::new();
        let id = queue.enqueue(&request(&fx.video), &fx.cache, accept_all).job_ids[0];
        queue.take_next().unwrap();
        queue.fail(id, &StageError::new(Stage::Resolve, "gone"));

        let job = queue.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("resolve stage failed: gone"));
        assert!(job.finished_at.is_some());
        assert_eq!(queue.enqueue(&request(&fx.video), &fx.cache, accept_all).added, 1);
    }

    #[test]
    fn test_response_serializes_reason_kind() {
        let response = EnqueueResponse {
            added: 0,
            job_ids: Vec::new(),
            skipped: vec![SkippedEntry {
                path: PathBuf::from("notes.txt"),
                reason: SkipReason::Unsupported {
                    message: "unsupported file extension".to_string(),
                },
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["added"], 0);
        assert_eq!(json["skipped"][0]["reason"]["kind"], "unsupported");
        assert_eq!(json["skipped"][0]["path"], "notes.txt");
    }

    #[test]
    fn test_progress_is_monotonic() {
        let fx = fixture();
        let queue = JobQueue::new();
        let id = queue.enqueue(&request(&fx.video), &fx.cache, accept_all).job_ids[0];
        queue.take_next().unwrap();
        queue.advance(id, JobStatus::Inferring).unwrap();

        queue.set_progress(id, 0.5);
        queue.set_progress(id, 0.3);
        assert_eq!(queue.get(id).unwrap().progress, 0.5);
    }
}
