//! Smoothness analysis: jittery signals get a higher absolute prominence floor.

use fungen_signal_model::{Analyzer, AnalyzerProposal, OptionKey, OptionValue};

use super::{AnalysisError, SignalFeatures};

/// Roughness at which the floor saturates. White noise scores 2.
const ROUGHNESS_REFERENCE: f64 = 0.5;

/// Largest floor, as a fraction of the signal range.
const MAX_FLOOR_FRACTION: f64 = 0.1;

pub(super) fn analyze(features: &SignalFeatures) -> Result<AnalyzerProposal, AnalysisError> {
    if features.sample_count < 3 {
        return Err(AnalysisError::new(
            Analyzer::Smoothness,
            format!("only {} samples", features.sample_count),
        ));
    }
    if features.is_flat() {
        return Err(AnalysisError::new(
            Analyzer::Smoothness,
            "signal has no dynamic range",
        ));
    }

    let level = (features.roughness / ROUGHNESS_REFERENCE).clamp(0.0, 1.0);
    let floor = features.range() * MAX_FLOOR_FRACTION * level;
    let description = if level > 0.5 {
        "Rough signal"
    } else if level < 0.1 {
        "Smooth signal"
    } else {
        "Moderately rough signal"
    };

    Ok(AnalyzerProposal::new(
        Analyzer::Smoothness,
        format!(
            "{description} (roughness {:.3}); minimum prominence {floor:.4}",
            features.roughness
        ),
    )
    .with(OptionKey::MinProminence, OptionValue::Float(floor)))
}
