//! Intensity analysis: the amplitude histogram steers the prominence ratio.
//!
//! A signal that spends most of its time near the middle of its range
//! produces many shallow actions; raising the prominence ratio keeps only
//! the full swings. A signal that lives at its extremes gets a lower ratio.

use fungen_signal_model::{Analyzer, AnalyzerProposal, OptionKey, OptionValue};

use super::{AnalysisError, SignalFeatures};

const HISTOGRAM_BINS: usize = 20;

/// Normalized band counted as "centre".
const CENTER_BAND: (f64, f64) = (0.3, 0.7);

/// Desired share of samples inside the centre band.
pub const CENTER_TARGET_RATIO: f64 = 0.4;

const FACTOR_GAIN: f64 = 1.0;
const FACTOR_MIN: f64 = 0.8;
const FACTOR_MAX: f64 = 1.2;

pub(super) fn analyze(
    features: &SignalFeatures,
    base_ratio: f64,
) -> Result<AnalyzerProposal, AnalysisError> {
    if features.sample_count == 0 || features.is_flat() {
        return Err(AnalysisError::new(
            Analyzer::Intensity,
            "signal has no dynamic range",
        ));
    }

    let histogram = histogram(features.normalized());
    let centre_share = centre_share(&histogram);

    let factor =
        (1.0 + (centre_share - CENTER_TARGET_RATIO) * FACTOR_GAIN).clamp(FACTOR_MIN, FACTOR_MAX);
    let ratio = (base_ratio * factor).clamp(0.0, 1.0);

    Ok(AnalyzerProposal::new(
        Analyzer::Intensity,
        format!(
            "{:.0}% of samples sit mid-range (target {:.0}%); prominence ratio scaled by {factor:.2}",
            centre_share * 100.0,
            CENTER_TARGET_RATIO * 100.0
        ),
    )
    .with(OptionKey::ProminenceRatio, OptionValue::Float(ratio)))
}

fn histogram(normalized: impl Iterator<Item = f64>) -> [usize; HISTOGRAM_BINS] {
    let mut bins = [0usize; HISTOGRAM_BINS];
    for v in normalized {
        let index = ((v * HISTOGRAM_BINS as f64) as usize).min(HISTOGRAM_BINS - 1);
        bins[index] += 1;
    }
    bins
}

fn centre_share(histogram: &[usize; HISTOGRAM_BINS]) -> f64 {
    let total: usize = histogram.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let first = (CENTER_BAND.0 * HISTOGRAM_BINS as f64).round() as usize;
    let last = (CENTER_BAND.1 * HISTOGRAM_BINS as f64).round() as usize;
    let centre: usize = histogram[first..last].iter().sum();
    centre as f64 / total as f64
}
