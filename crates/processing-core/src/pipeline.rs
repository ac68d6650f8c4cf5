//! The post-processing pipeline: raw signal in, funscript out.
//!
//! Stages run in a fixed order:
//! 1. optional frequency-domain denoise
//! 2. moving-average smoothing
//! 3. extrema detection with prominence gating
//! 4. merging of extrema closer than `merge_threshold_ms`
//! 5. slope constraint
//! 6. linear map onto integer positions `[0, 100]`

use serde::Serialize;

use fungen_common::FungenError;
use fungen_signal_model::{
    Action, Funscript, GeneratorInfo, OptionsError, PostprocessOptions, RawSignal, POSITION_RANGE,
};

use crate::denoise::{denoise, DenoiseConfig};
use crate::extrema::{detect_extrema, Extremum};
use crate::merge::ExtremaMerger;
use crate::slope::{IntensityProfile, SlopeLimiter, Waypoint};
use crate::smooth::SmoothingAlgorithm;
use crate::stats;

/// Errors raised for a signal the pipeline cannot process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProcessingError {
    #[error("signal has no samples")]
    EmptySignal,

    #[error("non-finite sample {value} at frame {index}")]
    NonFinite { index: usize, value: f64 },

    #[error(transparent)]
    InvalidOptions(#[from] OptionsError),
}

impl From<ProcessingError> for FungenError {
    fn from(err: ProcessingError) -> Self {
        FungenError::post_process(err.to_string())
    }
}

/// Intermediate results of every stage, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineTrace {
    pub denoised: Vec<f64>,
    pub smoothed: Vec<f64>,
    pub extrema: Vec<Extremum>,
    pub merged: Vec<Extremum>,
    pub waypoints: Vec<Waypoint>,
    pub actions: Vec<Action>,
}

/// Post-processor bound to one validated option set.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    options: PostprocessOptions,
}

impl PostProcessor {
    pub fn new(options: PostprocessOptions) -> Result<Self, ProcessingError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &PostprocessOptions {
        &self.options
    }

    /// Run every stage and keep the intermediate results.
    pub fn trace(&self, signal: &RawSignal) -> Result<PipelineTrace, ProcessingError> {
        let raw = signal.primary();
        check_samples(raw)?;
        let frame_ms = signal.frame_ms();

        let denoised = if self.options.fft_denoise {
            denoise(raw, &DenoiseConfig::from_options(&self.options))
        } else {
            raw.to_vec()
        };
        let smoothed = SmoothingAlgorithm::from_options(&self.options).apply(&denoised);

        let Some((lo, hi)) = stats::min_max(&smoothed) else {
            return Err(ProcessingError::EmptySignal);
        };
        if stats::is_flat(lo, hi) {
            tracing::debug!(samples = raw.len(), "Flat signal, no actions");
            return Ok(PipelineTrace {
                denoised,
                smoothed,
                extrema: Vec::new(),
                merged: Vec::new(),
                waypoints: Vec::new(),
                actions: Vec::new(),
            });
        }

        let extrema = detect_extrema(
            &smoothed,
            self.options.prominence_ratio,
            self.options.min_prominence,
        );
        let merged =
            ExtremaMerger::new(&smoothed, frame_ms, self.options.merge_threshold_ms).merge(&extrema);

        let gain = f64::from(POSITION_RANGE) / (hi - lo);
        let waypoints = SlopeLimiter::new(&self.options, gain, frame_ms)
            .with_intensity(IntensityProfile::new(raw))
            .constrain(&merged);
        let actions = to_actions(&waypoints, lo, gain);

        tracing::debug!(
            samples = raw.len(),
            extrema = extrema.len(),
            merged = merged.len(),
            actions = actions.len(),
            "Post-processing finished"
        );

        Ok(PipelineTrace {
            denoised,
            smoothed,
            extrema,
            merged,
            waypoints,
            actions,
        })
    }

    /// Produce the action sequence.
    pub fn actions(&self, signal: &RawSignal) -> Result<Vec<Action>, ProcessingError> {
        Ok(self.trace(signal)?.actions)
    }

    /// Produce a funscript whose generator block records these options.
    ///
    /// Source and model are left empty for the caller to fill in.
    pub fn process(&self, signal: &RawSignal) -> Result<Funscript, ProcessingError> {
        let actions = self.actions(signal)?;
        Ok(Funscript::new(
            actions,
            GeneratorInfo::new("", "", signal.fps(), self.options.clone()),
        ))
    }
}

/// Run the full pipeline with `options`.
pub fn process(signal: &RawSignal, options: &PostprocessOptions) -> Result<Funscript, ProcessingError> {
    PostProcessor::new(options.clone())?.process(signal)
}

fn check_samples(values: &[f64]) -> Result<(), ProcessingError> {
    if values.is_empty() {
        return Err(ProcessingError::EmptySignal);
    }
    match values.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(ProcessingError::NonFinite {
            index,
            value: values[index],
        }),
        None => Ok(()),
    }
}

/// Map waypoints onto integer positions and millisecond timestamps.
///
/// Timestamps that would not strictly increase are bumped by one
/// millisecond. Rounding that would push a transition past its slope limit
/// is pulled back toward the previous position.
fn to_actions(waypoints: &[Waypoint], lo: f64, gain: f64) -> Vec<Action> {
    let top = i64::from(POSITION_RANGE);
    let mut actions: Vec<Action> = Vec::with_capacity(waypoints.len());
    for point in waypoints {
        let mut at = point.time_ms.round().max(0.0) as u64;
        let mut pos = (((point.value - lo) * gain).round() as i64).clamp(0, top);

        if let Some(prev) = actions.last() {
            if at <= prev.at {
                at = prev.at + 1;
            }
            if let Some(limit) = point.limit {
                let dt_secs = (at - prev.at) as f64 / 1000.0;
                let allowed = (limit * dt_secs + 1e-9).floor() as i64;
                let delta = pos - i64::from(prev.pos);
                if delta.abs() > allowed {
                    pos = i64::from(prev.pos) + allowed * delta.signum();
                }
            }
        }

        actions.push(Action::new(at, pos.clamp(0, top) as u8));
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(fps: f64, seconds: f64, hz: f64) -> RawSignal {
        let n = (fps * seconds) as usize;
        let values = (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * hz * i as f64 / fps).sin())
            .collect();
        RawSignal::from_values(fps, values).unwrap()
    }

    fn fast_options() -> PostprocessOptions {
        PostprocessOptions {
            max_slope: 100.0,
            boost_slope: 100.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_sine_yields_alternating_extremes() {
        let script = process(&sine(30.0, 20.0, 0.5), &fast_options()).unwrap();
        let count = script.actions.len();
        assert!((18..=22).contains(&count), "got {count} actions");
        for pair in script.actions.windows(2) {
            assert!(pair[1].at > pair[0].at);
            assert!(pair[0].pos.abs_diff(pair[1].pos) > 50);
        }
    }

    #[test]
    fn test_flat_signal_is_empty() {
        let signal = RawSignal::from_values(30.0, vec![0.42; 300]).unwrap();
        let script = process(&signal, &PostprocessOptions::default()).unwrap();
        assert!(script.actions.is_empty());
    }

    #[test]
    fn test_non_finite_rejected() {
        let signal = RawSignal::from_values(30.0, vec![0.0, 1.0, f64::NAN, 0.0]).unwrap();
        let err = process(&signal, &PostprocessOptions::default()).unwrap_err();
        assert!(matches!(err, ProcessingError::NonFinite { index: 2, .. }));
    }

    #[test]
    fn test_empty_signal_rejected() {
        let signal = RawSignal::from_values(30.0, vec![]).unwrap();
        assert_eq!(
            process(&signal, &PostprocessOptions::default()).unwrap_err(),
            ProcessingError::EmptySignal
        );
    }

    #[test]
    fn test_invalid_options_rejected() {
        let opts = PostprocessOptions {
            smooth_window_frames: 0,
            ..Default::default()
        };
        assert!(matches!(
            PostProcessor::new(opts),
            Err(ProcessingError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_generator_block_records_options() {
        let opts = fast_options();
        let script = process(&sine(30.0, 4.0, 0.5), &opts).unwrap();
        assert_eq!(script.generator.options, opts);
        assert_eq!(script.generator.frame_rate, 30.0);
    }

    #[test]
    fn test_rounding_respects_limit() {
        let waypoints = [
            Waypoint {
                position: 0.0,
                time_ms: 0.0,
                value: 0.0,
                limit: None,
            },
            Waypoint {
                position: 10.5,
                time_ms: 350.0,
                value: 0.035,
                limit: Some(10.0),
            },
        ];
        // 3.5 positions in 350ms sits exactly on the limit; rounding up to 4 would not.
        let actions = to_actions(&waypoints, 0.0, 100.0);
        assert_eq!(actions[1], Action::new(350, 3));
    }

    #[test]
    fn test_colliding_timestamps_are_bumped() {
        let point = |time_ms: f64, value: f64| Waypoint {
            position: 0.0,
            time_ms,
            value,
            limit: None,
        };
        let actions = to_actions(&[point(10.2, 0.0), point(10.4, 1.0)], 0.0, 100.0);
        assert_eq!(actions[0].at, 10);
        assert_eq!(actions[1].at, 11);
    }

    #[test]
    fn test_error_converts_to_post_process() {
        let err: FungenError = ProcessingError::EmptySignal.into();
        assert!(matches!(err, FungenError::PostProcess { .. }));
    }
}
