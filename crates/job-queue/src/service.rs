//! Service facade: Enqueue, Recommend and Queue status.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::{spawn_blocking, JoinHandle};

use fungen_cache::{CacheStore, Fingerprint};
use fungen_common::{AppConfig, FungenError, FungenResult, QueueConfig};
use fungen_signal_model::{ModelRef, RawSignal, RecommendationResult};

use crate::gate::AcceleratorGate;
use crate::inference::InferenceEngine;
use crate::job::{JobId, JobStatusView, VideoJob};
use crate::queue::{EnqueueRequest, EnqueueResponse, JobQueue};
use crate::worker::Worker;

/// Owns the queue, the cache and the background worker.
///
/// Must be created inside a Tokio runtime.
pub struct FungenService {
    queue: Arc<JobQueue>,
    cache: Arc<CacheStore>,
    engine: Arc<dyn InferenceEngine>,
    gate: AcceleratorGate,
    queue_config: QueueConfig,
    stop_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FungenService {
    /// Start a service configured from `config`.
    pub fn start(config: &AppConfig, engine: Arc<dyn InferenceEngine>) -> Self {
        let cache = CacheStore::from_config(&config.cache).with_default_fps(config.inference.default_fps);
        Self::with_cache(cache, config.queue.clone(), engine)
    }

    /// Start a service over an explicit cache store.
    pub fn with_cache(
        cache: CacheStore,
        queue_config: QueueConfig,
        engine: Arc<dyn InferenceEngine>,
    ) -> Self {
        let queue = Arc::new(JobQueue::new());
        let cache = Arc::new(cache);
        let gate = AcceleratorGate::new();
        let stop_flag = Arc::new(AtomicBool::new(false));

        let worker = Worker::new(
            Arc::clone(&queue),
            Arc::clone(&cache),
            Arc::clone(&engine),
            gate.clone(),
        );
        let handle = tokio::spawn(worker.run(Arc::clone(&stop_flag)));

        Self {
            queue,
            cache,
            engine,
            gate,
            queue_config,
            stop_flag,
            worker: Some(handle),
        }
    }

    /// Add videos to the queue. Per-path problems are reported in the
    /// response instead of failing the request.
    pub fn enqueue(&self, request: &EnqueueRequest) -> EnqueueResponse {
        let response = self
            .queue
            .enqueue(request, &self.cache, |path| self.queue_config.accepts(path));
        tracing::info!(
            added = response.added,
            skipped = response.skipped.len(),
            model = %request.model.name,
            "Enqueue handled"
        );
        response
    }

    /// Recommend post-processing options for one video.
    ///
    /// Uses the cached signal when present, otherwise runs inference under
    /// the accelerator gate and caches the result. Never modifies a job.
    pub async fn recommend(&self, path: &Path, model: &ModelRef) -> FungenResult<RecommendationResult> {
        if !self.queue_config.accepts(path) {
            return Err(FungenError::input(format!(
                "unsupported file type: {}",
                path.display()
            )));
        }

        let cache = Arc::clone(&self.cache);
        let source = path.to_path_buf();
        let lookup_model = model.clone();
        let (fingerprint, cached) = spawn_blocking(move || {
            let fingerprint = Fingerprint::resolve(&source, &lookup_model)?;
            let cached = cache.lookup(&fingerprint);
            Ok::<_, fungen_cache::CacheError>((fingerprint, cached))
        })
        .await
        .map_err(|e| FungenError::input(e.to_string()))??;

        let signal = match cached {
            Some(found) => found.signal,
            None => self.infer_for_recommendation(&fingerprint, model).await?,
        };

        let result = fungen_processing_core::recommend(&signal);
        tracing::info!(
            path = %path.display(),
            recommended = result.recommended_options.len(),
            "Recommendation ready"
        );
        Ok(result)
    }

    async fn infer_for_recommendation(
        &self,
        fingerprint: &Fingerprint,
        model: &ModelRef,
    ) -> FungenResult<RawSignal> {
        let guard = self.gate.acquire().await;
        let engine = Arc::clone(&self.engine);
        let video = fingerprint.source().to_path_buf();
        let infer_model = model.clone();
        let signal = spawn_blocking(move || {
            let _guard = guard;
            engine.infer(&video, &infer_model, &|_| {})
        })
        .await
        .map_err(|e| FungenError::inference(e.to_string()))??;

        let cache = Arc::clone(&self.cache);
        let fp = fingerprint.clone();
        let (signal, stored) = spawn_blocking(move || {
            let stored = cache.store_signal(&fp, &signal);
            (signal, stored)
        })
        .await
        .map_err(|e| FungenError::persist(e.to_string()))?;
        if let Err(e) = stored {
            tracing::warn!(error = %e, "Failed to cache raw signal");
        }
        Ok(signal)
    }

    /// Snapshot of every job in submission order.
    pub fn status(&self) -> Vec<JobStatusView> {
        self.queue.status()
    }

    pub fn get(&self, id: JobId) -> Option<VideoJob> {
        self.queue.get(id)
    }

    /// See [`JobQueue::cancel`].
    pub fn cancel(&self, id: JobId) -> bool {
        self.queue.cancel(id)
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Wait until `id` reaches a terminal state.
    pub async fn wait_for(&self, id: JobId) -> Option<VideoJob> {
        let mut changes = self.queue.subscribe();
        loop {
            let job = self.queue.get(id)?;
            if job.status.is_terminal() {
                return Some(job);
            }
            if changes.changed().await.is_err() {
                return self.queue.get(id);
            }
        }
    }

    /// Wait until no job is active.
    pub async fn wait_idle(&self) {
        let mut changes = self.queue.subscribe();
        while self.queue.has_active() {
            if changes.changed().await.is_err() {
                break;
            }
        }
    }

    /// Stop the worker after its current job.
    pub async fn shutdown(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.queue.wake();
        if let Some(handle) = self.worker.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Job worker join failed");
            }
        }
    }
}

impl Drop for FungenService {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        self.queue.wake();
    }
}
