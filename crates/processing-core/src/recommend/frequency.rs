//! Frequency analysis: extrema density sets temporal resolution.

use fungen_signal_model::{Analyzer, AnalyzerProposal, OptionKey, OptionValue};

use super::{AnalysisError, SignalFeatures};
use crate::extrema::detect_extrema;
use crate::smooth::moving_average;

const MIN_SAMPLES: usize = 10;

/// Prominence ratio used to count extrema, lower than the pipeline default
/// so that moderate swings are counted too.
const COUNTING_PROMINENCE_RATIO: f64 = 0.05;

/// Merge threshold as a fraction of the estimated period.
const MERGE_PERIOD_FRACTION: f64 = 0.15;
const MERGE_MIN_MS: f64 = 40.0;
const MERGE_MAX_MS: f64 = 300.0;

const BASE_PROMINENCE_RATIO: f64 = 0.10;
const MAX_DENSITY_BOOST: f64 = 0.10;

const FFT_FRAMES_MIN: f64 = 5.0;
const FFT_FRAMES_MAX: f64 = 20.0;

pub(super) fn analyze(features: &SignalFeatures) -> Result<AnalyzerProposal, AnalysisError> {
    let fail = |reason: String| AnalysisError::new(Analyzer::Frequency, reason);

    if features.sample_count < MIN_SAMPLES {
        return Err(fail(format!("only {} samples", features.sample_count)));
    }
    if features.is_flat() {
        return Err(fail("signal has no dynamic range".to_string()));
    }

    let smoothed = moving_average(features.values(), 3);
    let count = detect_extrema(&smoothed, COUNTING_PROMINENCE_RATIO, 0.0).len();
    if count < 2 {
        return Err(fail(format!("{count} extrema are too few to estimate a period")));
    }

    // Two extrema per period.
    let density = count as f64 / features.sample_count as f64;
    let period_frames = 2.0 / density;
    let period_ms = period_frames * features.frame_ms();
    let action_hz = 1000.0 / period_ms;

    let merge_ms = (period_ms * MERGE_PERIOD_FRACTION).clamp(MERGE_MIN_MS, MERGE_MAX_MS);
    let prominence_ratio = BASE_PROMINENCE_RATIO + density.min(MAX_DENSITY_BOOST);
    let fft_frames = (period_frames / 2.0).clamp(FFT_FRAMES_MIN, FFT_FRAMES_MAX).round() as u32;

    Ok(AnalyzerProposal::new(
        Analyzer::Frequency,
        format!(
            "Estimated {action_hz:.2} Hz motion from {count} extrema over {:.1}s; \
             merge threshold {merge_ms:.0} ms, denoise window {fft_frames} frames",
            features.duration_secs
        ),
    )
    .with(OptionKey::MergeThresholdMs, OptionValue::Float(merge_ms))
    .with(OptionKey::ProminenceRatio, OptionValue::Float(prominence_ratio))
    .with(OptionKey::FftDenoise, OptionValue::Bool(true))
    .with(OptionKey::FftFramesPerComponent, OptionValue::Int(fft_frames)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fungen_signal_model::RawSignal;

    fn features(fps: f64, seconds: f64, hz: f64) -> SignalFeatures {
        let n = (fps * seconds) as usize;
        let values = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * hz * i as f64 / fps).sin())
            .collect();
        SignalFeatures::extract(&RawSignal::from_values(fps, values).unwrap()).unwrap()
    }

    fn value(proposal: &AnalyzerProposal, key: OptionKey) -> OptionValue {
        proposal
            .values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap()
    }

    #[test]
    fn test_slow_sine_caps_merge_threshold() {
        let proposal = analyze(&features(30.0, 20.0, 0.5)).unwrap();
        assert_eq!(
            value(&proposal, OptionKey::MergeThresholdMs),
            OptionValue::Float(MERGE_MAX_MS)
        );
        assert_eq!(
            value(&proposal, OptionKey::FftFramesPerComponent),
            OptionValue::Int(20)
        );
        assert!(proposal.rationale.contains("0.50 Hz"));
    }

    #[test]
    fn test_fast_sine_lowers_merge_and_raises_ratio() {
        let slow = analyze(&features(30.0, 20.0, 0.5)).unwrap();
        let fast = analyze(&features(30.0, 20.0, 2.0)).unwrap();

        let OptionValue::Float(fast_merge) = value(&fast, OptionKey::MergeThresholdMs) else {
            panic!("merge threshold is a float");
        };
        assert!((fast_merge - 75.0).abs() < 1.0, "merge {fast_merge}");

        let (OptionValue::Float(slow_ratio), OptionValue::Float(fast_ratio)) = (
            value(&slow, OptionKey::ProminenceRatio),
            value(&fast, OptionKey::ProminenceRatio),
        ) else {
            panic!("prominence ratio is a float");
        };
        assert!(fast_ratio > slow_ratio);
    }

    #[test]
    fn test_short_signal_is_skipped() {
        let err = analyze(&features(30.0, 0.2, 0.5)).unwrap_err();
        assert_eq!(err.analyzer, Analyzer::Frequency);
    }
}
