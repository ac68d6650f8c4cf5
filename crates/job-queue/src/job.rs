//! Video jobs and their state machine.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fungen_signal_model::{ModelRef, PostprocessOptions};

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a [`VideoJob`].
///
/// ```text
/// Queued → Resolving → Inferring → PostProcessing → Completed
///              └──────(cache hit)──────┘
/// Failed from any non-terminal state.
/// Cancelled from Queued, Resolving or Inferring.
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Resolving,
    Inferring,
    PostProcessing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the job still occupies its (path, model) slot.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            JobStatus::Queued | JobStatus::Resolving | JobStatus::Inferring
        )
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Queued, Resolving)
            | (Resolving, Inferring)
            | (Resolving, PostProcessing)
            | (Inferring, PostProcessing)
            | (PostProcessing, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            (from, Cancelled) => from.is_cancellable(),
            _ => false,
        }
    }

    /// Progress reported on entering this status.
    pub fn base_progress(self) -> f32 {
        match self {
            JobStatus::Queued => 0.0,
            JobStatus::Resolving => 0.05,
            JobStatus::Inferring => 0.1,
            JobStatus::PostProcessing => 0.9,
            JobStatus::Completed => 1.0,
            JobStatus::Failed | JobStatus::Cancelled => 0.0,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Queued => "queued",
            JobStatus::Resolving => "resolving",
            JobStatus::Inferring => "inferring",
            JobStatus::PostProcessing => "post-processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        f.pad(name)
    }
}

/// Worker stage, named in failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Resolve,
    Infer,
    PostProcess,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolve => "resolve",
            Stage::Infer => "infer",
            Stage::PostProcess => "post-process",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// A failure inside one worker stage.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage} stage failed: {message}")]
pub struct StageError {
    pub stage: Stage,
    pub message: String,
}

impl StageError {
    pub fn new(stage: Stage, err: impl fmt::Display) -> Self {
        Self {
            stage,
            message: err.to_string(),
        }
    }
}

/// One video scheduled for funscript generation.
#[derive(Debug, Clone, Serialize)]
pub struct VideoJob {
    pub id: JobId,
    /// Canonical source path.
    pub source_path: PathBuf,
    pub model: ModelRef,
    pub options: PostprocessOptions,
    /// Ignore cached signals for this job.
    pub force: bool,
    pub status: JobStatus,
    /// Fraction complete in `[0, 1]`.
    pub progress: f32,
    /// Fingerprint digest once resolved.
    pub fingerprint: Option<String>,
    /// Whether the raw signal came from the cache.
    pub reused_signal: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub signal_path: Option<PathBuf>,
    pub funscript_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl VideoJob {
    pub fn new(source_path: PathBuf, model: ModelRef, options: PostprocessOptions) -> Self {
        Self {
            id: JobId::new(),
            source_path,
            model,
            options,
            force: false,
            status: JobStatus::Queued,
            progress: 0.0,
            fingerprint: None,
            reused_signal: false,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            signal_path: None,
            funscript_path: None,
            error: None,
        }
    }
}

/// Read-only snapshot for queue listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub path: PathBuf,
    pub model: String,
    pub status: JobStatus,
    pub progress: f32,
    pub signal_path: Option<PathBuf>,
    pub funscript_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl From<&VideoJob> for JobStatusView {
    fn from(job: &VideoJob) -> Self {
        Self {
            id: job.id,
            path: job.source_path.clone(),
            model: job.model.name.clone(),
            status: job.status,
            progress: job.progress,
            signal_path: job.signal_path.clone(),
            funscript_path: job.funscript_path.clone(),
            error: job.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Resolving));
        assert!(Resolving.can_transition_to(Inferring));
        assert!(Resolving.can_transition_to(PostProcessing));
        assert!(Inferring.can_transition_to(PostProcessing));
        assert!(PostProcessing.can_transition_to(Completed));
    }

    #[test]
    fn test_invalid_transitions() {
        use JobStatus::*;
        assert!(!Queued.can_transition_to(Completed));
        assert!(!Inferring.can_transition_to(Resolving));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!PostProcessing.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Queued));
    }

    #[test]
    fn test_failure_and_cancellation_reachability() {
        use JobStatus::*;
        for status in [Queued, Resolving, Inferring, PostProcessing] {
            assert!(status.can_transition_to(Failed), "{status}");
        }
        for status in [Queued, Resolving, Inferring] {
            assert!(status.can_transition_to(Cancelled), "{status}");
        }
    }

    #[test]
    fn test_stage_error_names_stage() {
        let err = StageError::new(Stage::PostProcess, "signal has no samples");
        assert_eq!(
            err.to_string(),
            "post-process stage failed: signal has no samples"
        );
    }

    #[test]
    fn test_job_id_parses_back() {
        let id = JobId::new();
        let parsed: JobId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
