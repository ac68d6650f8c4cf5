//! Amplitude analysis: motion speed and variability set smoothing and
//! slope limits.

use fungen_signal_model::{Analyzer, AnalyzerProposal, OptionKey, OptionValue};

use super::{AnalysisError, SignalFeatures};
use crate::stats;

/// Slope limits in strokes per second as `(floor, span)`: the proposal is
/// `floor + span * amplitude` for an amplitude score in `[0, 1]`.
const MAX_SLOPE_SCALE: (f64, f64) = (2.5, 1.5);
const BOOST_SLOPE_SCALE: (f64, f64) = (1.5, 1.5);

/// `(variability above, window)`: busier signals get narrower windows.
const WINDOW_STEPS: [(f64, u32); 3] = [(0.15, 5), (0.08, 6), (0.03, 7)];
const CALM_WINDOW: u32 = 8;

/// Amplitude score in `[0, 1]` from per-frame change and overall range,
/// for a signal whose natural scale is `[0, 1]`.
fn amplitude_score(mean_change: f64, max_change: f64, range: f64) -> f64 {
    let change = (mean_change + max_change) / 2.0;
    ((change * 2.0 + range.min(1.0)) / 2.0).clamp(0.0, 1.0)
}

pub(super) fn analyze(features: &SignalFeatures) -> Result<AnalyzerProposal, AnalysisError> {
    if features.sample_count < 2 || features.is_flat() {
        return Err(AnalysisError::new(
            Analyzer::Amplitude,
            "not enough motion to measure",
        ));
    }

    let changes: Vec<f64> = stats::first_differences(features.values())
        .iter()
        .map(|d| d.abs())
        .collect();
    let Some((_, max_change)) = stats::min_max(&changes) else {
        return Err(AnalysisError::new(Analyzer::Amplitude, "no transitions"));
    };
    let mean_change = stats::mean(&changes);
    let score = amplitude_score(mean_change, max_change, features.range());

    let max_slope = MAX_SLOPE_SCALE.0 + MAX_SLOPE_SCALE.1 * score;
    let boost_slope = BOOST_SLOPE_SCALE.0 + BOOST_SLOPE_SCALE.1 * score;

    let variability = features.diff_std / features.range();
    let window = WINDOW_STEPS
        .iter()
        .find(|(threshold, _)| variability > *threshold)
        .map_or(CALM_WINDOW, |(_, window)| *window);

    Ok(AnalyzerProposal::new(
        Analyzer::Amplitude,
        format!(
            "amplitude score {score:.2} allows {max_slope:.2} strokes/s \
             ({boost_slope:.2} when intense); variability {variability:.3} \
             suggests a {window}-frame smoothing window"
        ),
    )
    .with(OptionKey::SmoothWindowFrames, OptionValue::Int(window))
    .with(OptionKey::MaxSlope, OptionValue::Float(max_slope))
    .with(OptionKey::BoostSlope, OptionValue::Float(boost_slope)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fungen_signal_model::RawSignal;

    fn proposal(values: Vec<f64>) -> AnalyzerProposal {
        let features =
            SignalFeatures::extract(&RawSignal::from_values(30.0, values).unwrap()).unwrap();
        analyze(&features).unwrap()
    }

    fn get(proposal: &AnalyzerProposal, key: OptionKey) -> OptionValue {
        proposal
            .values
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .unwrap()
    }

    fn float(value: OptionValue) -> f64 {
        let OptionValue::Float(v) = value else {
            panic!("expected a float, got {value:?}");
        };
        v
    }

    #[test]
    fn test_sine_gets_mid_range_limits() {
        // Per-frame change of a 0.5 Hz sine at 30 fps: mean 1/15, peak pi/30.
        let values: Vec<f64> = (0..600)
            .map(|i| (2.0 * std::f64::consts::PI * 0.5 * i as f64 / 30.0).sin())
            .collect();
        let p = proposal(values);
        let max = float(get(&p, OptionKey::MaxSlope));
        let boost = float(get(&p, OptionKey::BoostSlope));
        assert!(max > 3.3 && max < 3.45, "max slope {max}");
        assert!((max - boost - 1.0).abs() < 1e-9, "boost slope {boost}");
        assert_eq!(get(&p, OptionKey::SmoothWindowFrames), OptionValue::Int(7));
    }

    #[test]
    fn test_small_slow_signal_gets_lowest_limits() {
        let values: Vec<f64> = (0..600)
            .map(|i| 0.01 * (2.0 * std::f64::consts::PI * 0.2 * i as f64 / 30.0).sin())
            .collect();
        let p = proposal(values);
        let max = float(get(&p, OptionKey::MaxSlope));
        let boost = float(get(&p, OptionKey::BoostSlope));
        assert!(max >= 2.5 && max < 2.55, "max slope {max}");
        assert!(boost >= 1.5 && boost < 1.55, "boost slope {boost}");
    }

    #[test]
    fn test_jittery_signal_gets_narrow_window() {
        let values: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 0.0 } else { 1.0 }).collect();
        let p = proposal(values);
        assert_eq!(get(&p, OptionKey::SmoothWindowFrames), OptionValue::Int(5));
        assert_eq!(get(&p, OptionKey::MaxSlope), OptionValue::Float(4.0));
        assert_eq!(get(&p, OptionKey::BoostSlope), OptionValue::Float(3.0));
    }

    #[test]
    fn test_flat_signal_is_skipped() {
        let features =
            SignalFeatures::extract(&RawSignal::from_values(30.0, vec![0.2; 30]).unwrap())
                .unwrap();
        assert!(analyze(&features).is_err());
    }
}
