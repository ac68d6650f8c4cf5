//! Fungen Job Queue
//!
//! Owns the lifecycle of video jobs: enqueue with cache reuse, a single
//! background worker that runs Resolve → Infer → PostProcess → Persist, and
//! the [`FungenService`] facade exposing Enqueue, Recommend and Queue status.

pub mod gate;
pub mod inference;
pub mod job;
pub mod queue;
pub mod service;
pub mod worker;

pub use gate::AcceleratorGate;
pub use inference::{CommandInferenceEngine, InferenceEngine, InferenceError};
pub use job::{JobId, JobStatus, JobStatusView, Stage, StageError, VideoJob};
pub use queue::{EnqueueRequest, EnqueueResponse, JobQueue, SkipReason, SkippedEntry};
pub use service::FungenService;
pub use worker::Worker;
