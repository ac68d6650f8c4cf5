//! Rate-of-change limits on the extrema sequence.
//!
//! Options give limits in full strokes per second: a slope of 1 allows one
//! sweep across the whole 0..100 range per second. The limiter converts them
//! to positions per second and works in signal units ahead of the final
//! linear map, using the map's gain, so clipping a transition here keeps it
//! inside the bound once mapped.

use serde::Serialize;

use fungen_signal_model::{PostprocessOptions, POSITION_RANGE};

use crate::extrema::Extremum;
use crate::stats::{self, PrefixSums};

/// Standard deviations above the mean absolute raw value that mark a
/// transition as high-intensity.
pub const BOOST_INTENSITY_SIGMA: f64 = 0.5;

/// A point of the constrained sequence, still in signal units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Waypoint {
    /// Frame position.
    pub position: f64,
    pub time_ms: f64,
    pub value: f64,
    /// Limit that applied to the transition into this point, positions/s.
    pub limit: Option<f64>,
}

/// Marks spans of the raw signal whose magnitude is unusually high.
#[derive(Debug)]
pub struct IntensityProfile {
    sums: PrefixSums,
    threshold: f64,
}

impl IntensityProfile {
    pub fn new(raw: &[f64]) -> Self {
        let magnitudes: Vec<f64> = raw.iter().map(|v| v.abs()).collect();
        let threshold = stats::mean(&magnitudes) + BOOST_INTENSITY_SIGMA * stats::std_dev(&magnitudes);
        Self {
            sums: PrefixSums::new(magnitudes),
            threshold,
        }
    }

    /// Whether the mean magnitude over frames `[from, to]` exceeds the threshold.
    pub fn is_high(&self, from: f64, to: f64) -> bool {
        if self.sums.len() == 0 {
            return false;
        }
        let lo = from.min(to).floor().max(0.0) as usize;
        let hi = from.max(to).ceil().max(0.0) as usize;
        self.sums.mean(lo, hi) > self.threshold
    }
}

/// Positions per second for a slope option of 1.
pub fn positions_per_second(slope: f64) -> f64 {
    slope * f64::from(POSITION_RANGE)
}

/// Clips and suppresses transitions between consecutive extrema.
///
/// All limits are held in positions per second.
#[derive(Debug)]
pub struct SlopeLimiter {
    max_slope: f64,
    boost_slope: f64,
    min_slope: f64,
    /// Positions per signal unit.
    gain: f64,
    frame_ms: f64,
    intensity: Option<IntensityProfile>,
}

impl SlopeLimiter {
    pub fn new(options: &PostprocessOptions, gain: f64, frame_ms: f64) -> Self {
        Self {
            max_slope: positions_per_second(options.max_slope),
            boost_slope: positions_per_second(options.boost_slope),
            min_slope: positions_per_second(options.min_slope),
            gain,
            frame_ms,
            intensity: None,
        }
    }

    /// Enable `boost_slope` for spans where the raw signal is intense.
    pub fn with_intensity(mut self, profile: IntensityProfile) -> Self {
        self.intensity = Some(profile);
        self
    }

    /// Constrain the extrema sequence.
    ///
    /// Each transition is measured from the last emitted point. Transitions
    /// slower than `min_slope` are dropped; faster than the applicable limit
    /// are clipped short of their target.
    pub fn constrain(&self, extrema: &[Extremum]) -> Vec<Waypoint> {
        let mut out: Vec<Waypoint> = Vec::with_capacity(extrema.len());
        for extremum in extrema {
            let time_ms = extremum.position * self.frame_ms;
            let Some(prev) = out.last().copied() else {
                out.push(Waypoint {
                    position: extremum.position,
                    time_ms,
                    value: extremum.value,
                    limit: None,
                });
                continue;
            };

            let dt_secs = (time_ms - prev.time_ms) / 1000.0;
            if dt_secs <= 0.0 {
                continue;
            }
            let delta = extremum.value - prev.value;
            let speed = delta.abs() * self.gain / dt_secs;
            if speed < self.min_slope {
                tracing::trace!(at_ms = time_ms, speed, "Dropping slow transition");
                continue;
            }

            let limit = self.limit_between(prev.position, extremum.position);
            let allowed = limit * dt_secs / self.gain;
            out.push(Waypoint {
                position: extremum.position,
                time_ms,
                value: prev.value + delta.clamp(-allowed, allowed),
                limit: Some(limit),
            });
        }
        out
    }

    fn limit_between(&self, from: f64, to: f64) -> f64 {
        match &self.intensity {
            Some(profile) if profile.is_high(from, to) => self.boost_slope,
            _ => self.max_slope,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::ExtremumKind;

    fn ext(position: f64, value: f64) -> Extremum {
        Extremum {
            position,
            value,
            kind: ExtremumKind::Peak,
            prominence: 1.0,
        }
    }

    fn options(max: f64, boost: f64, min: f64) -> PostprocessOptions {
        PostprocessOptions {
            max_slope: max,
            boost_slope: boost,
            min_slope: min,
            ..Default::default()
        }
    }

    #[test]
    fn test_fast_transition_is_clipped() {
        // gain 100: one signal unit spans the full position range.
        let limiter = SlopeLimiter::new(&options(0.5, 0.5, 0.0), 100.0, 10.0);
        let out = limiter.constrain(&[ext(0.0, 0.0), ext(100.0, 1.0)]);
        // 1 second at half a stroke per second reaches half the range.
        assert_eq!(out.len(), 2);
        assert!((out[1].value - 0.5).abs() < 1e-12);
        assert_eq!(out[1].limit, Some(50.0));
    }

    #[test]
    fn test_slow_transition_is_dropped() {
        let limiter = SlopeLimiter::new(&options(10.0, 10.0, 0.2), 100.0, 10.0);
        let out = limiter.constrain(&[ext(0.0, 0.0), ext(100.0, 0.1), ext(150.0, 1.0)]);
        // 10 positions/s is dropped; the next transition starts from the first point.
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].position, 150.0);
        assert!((out[1].value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_intense_span_uses_boost_limit() {
        let mut raw = vec![0.1; 200];
        for v in raw.iter_mut().skip(100) {
            *v = 5.0;
        }
        let limiter = SlopeLimiter::new(&options(1.0, 0.2, 0.0), 100.0, 10.0)
            .with_intensity(IntensityProfile::new(&raw));
        let out = limiter.constrain(&[
            ext(0.0, 0.0),
            ext(50.0, 1.0),
            ext(120.0, 0.0),
            ext(190.0, 1.0),
        ]);
        assert_eq!(out.len(), 4);
        assert_eq!(out[1].limit, Some(100.0));
        assert_eq!(out[3].limit, Some(20.0));
        assert!((out[3].value - out[2].value - 0.14).abs() < 1e-9);
    }

    #[test]
    fn test_default_limits_pass_a_one_second_stroke() {
        let limiter = SlopeLimiter::new(&PostprocessOptions::default(), 100.0, 10.0);
        let out = limiter.constrain(&[ext(0.0, 0.0), ext(100.0, 1.0), ext(200.0, 0.0)]);
        assert_eq!(out.len(), 3);
        assert!((out[1].value - 1.0).abs() < 1e-12);
        assert!(out[2].value.abs() < 1e-12);
        assert_eq!(out[1].limit, Some(1000.0));
    }

    #[test]
    fn test_intensity_threshold() {
        let profile = IntensityProfile::new(&[0.0, 0.0, 0.0, 10.0]);
        assert!(profile.is_high(3.0, 3.0));
        assert!(!profile.is_high(0.0, 1.0));
    }

    #[test]
    fn test_limiter_debug_shows_profile() {
        let limiter = SlopeLimiter::new(&PostprocessOptions::default(), 100.0, 10.0)
            .with_intensity(IntensityProfile::new(&[0.0, 1.0]));
        let shown = format!("{limiter:?}");
        assert!(shown.contains("IntensityProfile"));
        assert!(shown.contains("PrefixSums"));
    }
}
