//! Background worker running one job at a time.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::task::spawn_blocking;

use fungen_cache::{CacheStore, Fingerprint};
use fungen_processing_core::process;
use fungen_signal_model::{Funscript, RawSignal};

use crate::gate::AcceleratorGate;
use crate::inference::InferenceEngine;
use crate::job::{JobId, JobStatus, Stage, StageError, VideoJob};
use crate::queue::{Claim, JobQueue};

/// Progress span covered by inference.
const INFER_PROGRESS_START: f32 = 0.1;
const INFER_PROGRESS_END: f32 = 0.9;

/// Pulls jobs from a [`JobQueue`] and drives them through
/// Resolve → Infer → PostProcess → Persist.
///
/// A failure is recorded on the job and the worker moves on. Artifacts
/// are written atomically, so a failed or cancelled job leaves no partial
/// file behind.
#[derive(Clone)]
pub struct Worker {
    queue: Arc<JobQueue>,
    cache: Arc<CacheStore>,
    engine: Arc<dyn InferenceEngine>,
    gate: AcceleratorGate,
}

impl Worker {
    pub fn new(
        queue: Arc<JobQueue>,
        cache: Arc<CacheStore>,
        engine: Arc<dyn InferenceEngine>,
        gate: AcceleratorGate,
    ) -> Self {
        Self {
            queue,
            cache,
            engine,
            gate,
        }
    }

    /// Process jobs until `stop` is set. The job in flight finishes first.
    pub async fn run(self, stop: Arc<AtomicBool>) {
        tracing::info!("Job worker started");
        while !stop.load(Ordering::SeqCst) {
            if self.process_next().await.is_none() {
                self.queue.work_available().await;
            }
        }
        tracing::info!("Job worker stopped");
    }

    /// Run the oldest pending job to a terminal state.
    ///
    /// Returns `None` when nothing was pending.
    pub async fn process_next(&self) -> Option<JobId> {
        let claim = self.queue.take_next()?;
        let id = claim.job.id;
        let started = Instant::now();
        tracing::info!(job = %id, path = %claim.job.source_path.display(), model = %claim.job.model.name, "Processing job");

        match self.run_job(claim).await {
            Ok(Some(path)) => match self.queue.complete(id, path.clone()) {
                Ok(()) => tracing::info!(
                    job = %id,
                    funscript = %path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed"
                ),
                Err(e) => tracing::warn!(job = %id, error = %e, "Could not mark job completed"),
            },
            Ok(None) => tracing::info!(job = %id, "Job cancelled"),
            Err(err) => self.queue.fail(id, &err),
        }
        Some(id)
    }

    async fn run_job(&self, claim: Claim) -> Result<Option<PathBuf>, StageError> {
        let job = claim.job;
        let (fingerprint, signal) = match claim.cached {
            Some(cached) => cached,
            None => match self.acquire_signal(&job).await? {
                Some(resolved) => resolved,
                None => return Ok(None),
            },
        };

        let script = self.post_process(&job, &fingerprint, signal).await?;
        let path = self.persist(&fingerprint, script).await?;
        Ok(Some(path))
    }

    /// Resolve and, on a cache miss, infer. `None` means cancelled.
    async fn acquire_signal(
        &self,
        job: &VideoJob,
    ) -> Result<Option<(Fingerprint, RawSignal)>, StageError> {
        let cache = Arc::clone(&self.cache);
        let source = job.source_path.clone();
        let model = job.model.clone();
        let force = job.force;
        let (fingerprint, cached) = spawn_blocking(move || {
            let fingerprint = Fingerprint::resolve(&source, &model)?;
            let cached = if force { None } else { cache.lookup(&fingerprint) };
            Ok::<_, fungen_cache::CacheError>((fingerprint, cached))
        })
        .await
        .map_err(|e| StageError::new(Stage::Resolve, e))?
        .map_err(|e| StageError::new(Stage::Resolve, e))?;

        self.queue.set_resolved(
            job.id,
            &fingerprint,
            cached.as_ref().map(|c| c.path.clone()),
        );

        if let Some(found) = cached {
            tracing::info!(job = %job.id, signal = %found.path.display(), "Cached signal found");
            if !self.advance(job.id, JobStatus::PostProcessing, Stage::Resolve)? {
                return Ok(None);
            }
            return Ok(Some((fingerprint, found.signal)));
        }

        if !self.advance(job.id, JobStatus::Inferring, Stage::Resolve)? {
            return Ok(None);
        }
        let signal = self.infer(job, &fingerprint).await?;
        if !self.advance(job.id, JobStatus::PostProcessing, Stage::Infer)? {
            return Ok(None);
        }
        Ok(Some((fingerprint, signal)))
    }

    async fn infer(&self, job: &VideoJob, fingerprint: &Fingerprint) -> Result<RawSignal, StageError> {
        let guard = self.gate.acquire().await;
        let engine = Arc::clone(&self.engine);
        let queue = Arc::clone(&self.queue);
        let id = job.id;
        let video = job.source_path.clone();
        let model = job.model.clone();

        let signal = spawn_blocking(move || {
            let _guard = guard;
            let progress = |fraction: f32| {
                let span = INFER_PROGRESS_END - INFER_PROGRESS_START;
                queue.set_progress(id, INFER_PROGRESS_START + span * fraction.clamp(0.0, 1.0));
            };
            engine.infer(&video, &model, &progress)
        })
        .await
        .map_err(|e| StageError::new(Stage::Infer, e))?
        .map_err(|e| StageError::new(Stage::Infer, e))?;

        if signal.is_empty() {
            return Err(StageError::new(Stage::Infer, "engine returned no samples"));
        }
        tracing::info!(
            job = %id,
            samples = signal.sample_count(),
            fps = signal.fps(),
            "Inference finished"
        );

        // Cache write failures are logged and the job carries on.
        let cache = Arc::clone(&self.cache);
        let fp = fingerprint.clone();
        match spawn_blocking(move || {
            let stored = cache.store_signal(&fp, &signal);
            (signal, stored)
        })
        .await
        {
            Ok((signal, Ok(path))) => {
                self.queue.set_signal_path(id, path);
                Ok(signal)
            }
            Ok((signal, Err(e))) => {
                tracing::warn!(job = %id, error = %e, "Failed to cache raw signal");
                Ok(signal)
            }
            Err(e) => Err(StageError::new(Stage::Infer, e)),
        }
    }

    async fn post_process(
        &self,
        job: &VideoJob,
        fingerprint: &Fingerprint,
        signal: RawSignal,
    ) -> Result<Funscript, StageError> {
        let options = job.options.clone();
        let mut script = spawn_blocking(move || process(&signal, &options))
            .await
            .map_err(|e| StageError::new(Stage::PostProcess, e))?
            .map_err(|e| StageError::new(Stage::PostProcess, e))?;

        script.generator.source = job.source_path.display().to_string();
        script.generator.model = job.model.name.clone();
        script.generator.fingerprint = Some(fingerprint.digest().to_string());
        tracing::debug!(job = %job.id, actions = script.actions.len(), "Post-processing finished");
        Ok(script)
    }

    async fn persist(&self, fingerprint: &Fingerprint, script: Funscript) -> Result<PathBuf, StageError> {
        let cache = Arc::clone(&self.cache);
        let fp = fingerprint.clone();
        spawn_blocking(move || cache.store_funscript(&fp, &script))
            .await
            .map_err(|e| StageError::new(Stage::Persist, e))?
            .map_err(|e| StageError::new(Stage::Persist, e))
    }

    fn advance(&self, id: JobId, next: JobStatus, stage: Stage) -> Result<bool, StageError> {
        self.queue
            .advance(id, next)
            .map_err(|e| StageError::new(stage, e))
    }
}
