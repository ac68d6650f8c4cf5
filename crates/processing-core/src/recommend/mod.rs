//! Parameter recommender.
//!
//! Independent analyzers read statistics of the raw signal and each propose
//! a few option values with a rationale. Proposals are folded into one
//! [`RecommendationResult`] in a fixed order, so a later analyzer may refine
//! an earlier value and the refinement shows up in the reasoning text. An
//! analyzer that cannot produce a value is skipped with a note; the other
//! analyzers still contribute.

mod amplitude;
mod features;
mod frequency;
mod intensity;
mod smoothness;

use fungen_common::FungenError;
use fungen_signal_model::{
    Analyzer, AnalyzerProposal, OptionKey, OptionValue, PostprocessOptions, RawSignal,
    RecommendationResult,
};

pub use features::SignalFeatures;

/// An analyzer could not derive a suggestion from this signal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{analyzer} analysis skipped: {reason}")]
pub struct AnalysisError {
    pub analyzer: Analyzer,
    pub reason: String,
}

impl AnalysisError {
    pub(crate) fn new(analyzer: Analyzer, reason: impl Into<String>) -> Self {
        Self {
            analyzer,
            reason: reason.into(),
        }
    }
}

impl From<AnalysisError> for FungenError {
    fn from(err: AnalysisError) -> Self {
        FungenError::recommendation(err.to_string())
    }
}

/// Recommend post-processing options for `signal`.
///
/// Pure and read-only. Every value is clamped into its option domain.
pub fn recommend(signal: &RawSignal) -> RecommendationResult {
    let mut result = RecommendationResult::new();

    let features = match SignalFeatures::extract(signal) {
        Ok(features) => features,
        Err(reason) => {
            tracing::warn!(%reason, "Signal unusable for recommendations");
            result.note(&format!("No recommendations: {reason}"));
            return result;
        }
    };

    fold(&mut result, frequency::analyze(&features));
    fold(&mut result, amplitude::analyze(&features));
    fold(&mut result, smoothness::analyze(&features));

    let base_ratio = match result.get(OptionKey::ProminenceRatio) {
        Some(OptionValue::Float(ratio)) => ratio,
        _ => PostprocessOptions::default().prominence_ratio,
    };
    fold(&mut result, intensity::analyze(&features, base_ratio));

    tracing::debug!(
        suggested = result.recommended_options.len(),
        "Recommendation finished"
    );
    result
}

fn fold(result: &mut RecommendationResult, outcome: Result<AnalyzerProposal, AnalysisError>) {
    match outcome {
        Ok(proposal) => result.merge(proposal),
        Err(err) => {
            tracing::warn!(analyzer = %err.analyzer, reason = %err.reason, "Analyzer fell back");
            result.note(&err.to_string());
        }
    }
}
