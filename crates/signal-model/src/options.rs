//! Post-processing options and their domain table.
//!
//! [`OptionKey`] is the fixed, enumerable mapping between option fields,
//! the recommender analyzer that proposes them, and the label a front end
//! shows next to an "apply" affordance. All reads and writes by key go
//! through this table; there is no dynamic field lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::recommendation::Analyzer;

/// Tunable parameters of the signal post-processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostprocessOptions {
    /// Moving-average width in samples; 1 disables smoothing.
    pub smooth_window_frames: u32,

    /// Prominence threshold relative to the signal's dynamic range, `[0, 1]`.
    pub prominence_ratio: f64,

    /// Absolute prominence floor in signal units.
    pub min_prominence: f64,

    /// Rate limit in full strokes (0..100) per second.
    pub max_slope: f64,

    /// Rate limit for high-intensity transitions, strokes per second.
    pub boost_slope: f64,

    /// Transitions slower than this (strokes per second) are dropped.
    pub min_slope: f64,

    /// Extrema closer than this are merged.
    pub merge_threshold_ms: f64,

    /// Enable the frequency-domain denoise stage.
    pub fft_denoise: bool,

    /// Denoise hop length in samples (window length when no overlap is set).
    pub fft_frames_per_component: u32,

    /// Optional denoise window length; larger than the hop means overlap.
    pub fft_window_frames: Option<u32>,
}

impl Default for PostprocessOptions {
    fn default() -> Self {
        Self {
            smooth_window_frames: 3,
            prominence_ratio: 0.1,
            min_prominence: 0.0,
            max_slope: 10.0,
            boost_slope: 7.0,
            min_slope: 0.0,
            merge_threshold_ms: 120.0,
            fft_denoise: true,
            fft_frames_per_component: 10,
            fft_window_frames: None,
        }
    }
}

/// Identifies one field of [`PostprocessOptions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionKey {
    SmoothWindowFrames,
    ProminenceRatio,
    MinProminence,
    MaxSlope,
    BoostSlope,
    MinSlope,
    MergeThresholdMs,
    FftDenoise,
    FftFramesPerComponent,
    FftWindowFrames,
}

/// A value for one option field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(u32),
    Float(f64),
}

/// Valid range of an option field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionDomain {
    Int { min: u32, max: u32 },
    Float { min: f64, max: f64 },
    Bool,
}

impl OptionKey {
    /// Every option key, in declaration order.
    pub const ALL: [OptionKey; 10] = [
        OptionKey::SmoothWindowFrames,
        OptionKey::ProminenceRatio,
        OptionKey::MinProminence,
        OptionKey::MaxSlope,
        OptionKey::BoostSlope,
        OptionKey::MinSlope,
        OptionKey::MergeThresholdMs,
        OptionKey::FftDenoise,
        OptionKey::FftFramesPerComponent,
        OptionKey::FftWindowFrames,
    ];

    /// Serialized field name, identical to the `PostprocessOptions` field.
    pub fn field_name(self) -> &'static str {
        match self {
            OptionKey::SmoothWindowFrames => "smooth_window_frames",
            OptionKey::ProminenceRatio => "prominence_ratio",
            OptionKey::MinProminence => "min_prominence",
            OptionKey::MaxSlope => "max_slope",
            OptionKey::BoostSlope => "boost_slope",
            OptionKey::MinSlope => "min_slope",
            OptionKey::MergeThresholdMs => "merge_threshold_ms",
            OptionKey::FftDenoise => "fft_denoise",
            OptionKey::FftFramesPerComponent => "fft_frames_per_component",
            OptionKey::FftWindowFrames => "fft_window_frames",
        }
    }

    /// Human-readable label for settings screens.
    pub fn label(self) -> &'static str {
        match self {
            OptionKey::SmoothWindowFrames => "Smoothing window (frames)",
            OptionKey::ProminenceRatio => "Prominence ratio",
            OptionKey::MinProminence => "Minimum prominence",
            OptionKey::MaxSlope => "Max slope",
            OptionKey::BoostSlope => "Boost slope",
            OptionKey::MinSlope => "Min slope",
            OptionKey::MergeThresholdMs => "Merge threshold (ms)",
            OptionKey::FftDenoise => "FFT denoise",
            OptionKey::FftFramesPerComponent => "FFT frames per component",
            OptionKey::FftWindowFrames => "FFT window (frames)",
        }
    }

    /// Analyzer that proposes this field, if any.
    pub fn analyzer(self) -> Option<Analyzer> {
        match self {
            OptionKey::MergeThresholdMs
            | OptionKey::FftDenoise
            | OptionKey::FftFramesPerComponent => Some(Analyzer::Frequency),
            OptionKey::ProminenceRatio => Some(Analyzer::Intensity),
            OptionKey::MinProminence => Some(Analyzer::Smoothness),
            OptionKey::SmoothWindowFrames | OptionKey::MaxSlope | OptionKey::BoostSlope => {
                Some(Analyzer::Amplitude)
            }
            OptionKey::MinSlope | OptionKey::FftWindowFrames => None,
        }
    }

    /// Domain bounds shared by manual entry and recommendations.
    pub fn domain(self) -> OptionDomain {
        match self {
            OptionKey::SmoothWindowFrames => OptionDomain::Int { min: 1, max: 240 },
            OptionKey::ProminenceRatio => OptionDomain::Float { min: 0.0, max: 1.0 },
            OptionKey::MinProminence => OptionDomain::Float {
                min: 0.0,
                max: 1.0e6,
            },
            OptionKey::MaxSlope | OptionKey::BoostSlope | OptionKey::MinSlope => {
                OptionDomain::Float {
                    min: 0.0,
                    max: 1_000.0,
                }
            }
            OptionKey::MergeThresholdMs => OptionDomain::Float {
                min: 0.0,
                max: 10_000.0,
            },
            OptionKey::FftDenoise => OptionDomain::Bool,
            OptionKey::FftFramesPerComponent => OptionDomain::Int { min: 1, max: 1024 },
            OptionKey::FftWindowFrames => OptionDomain::Int { min: 1, max: 65_536 },
        }
    }

    /// Parse a serialized field name.
    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.field_name() == name)
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "{v}"),
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Float(v) => write!(f, "{v:.3}"),
        }
    }
}

impl OptionDomain {
    /// Clamp `value` into this domain, converting numeric kinds as needed.
    ///
    /// Returns `None` when the value kind cannot represent this domain
    /// (a boolean for a numeric field or the reverse) or is not finite.
    pub fn clamp(self, value: OptionValue) -> Option<OptionValue> {
        match (self, value) {
            (OptionDomain::Bool, OptionValue::Bool(v)) => Some(OptionValue::Bool(v)),
            (OptionDomain::Bool, _) | (_, OptionValue::Bool(_)) => None,
            (OptionDomain::Int { min, max }, OptionValue::Int(v)) => {
                Some(OptionValue::Int(v.clamp(min, max)))
            }
            (OptionDomain::Int { min, max }, OptionValue::Float(v)) => {
                if !v.is_finite() {
                    return None;
                }
                let rounded = v.round().clamp(min as f64, max as f64);
                Some(OptionValue::Int(rounded as u32))
            }
            (OptionDomain::Float { min, max }, OptionValue::Float(v)) => {
                if !v.is_finite() {
                    return None;
                }
                Some(OptionValue::Float(v.clamp(min, max)))
            }
            (OptionDomain::Float { min, max }, OptionValue::Int(v)) => {
                Some(OptionValue::Float((v as f64).clamp(min, max)))
            }
        }
    }

    /// Whether `value` already lies inside this domain.
    pub fn contains(self, value: OptionValue) -> bool {
        self.clamp(value) == Some(value)
    }
}

/// Error raised for an out-of-domain option.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid option {key}: {message}")]
pub struct OptionsError {
    pub key: OptionKey,
    pub message: String,
}

impl PostprocessOptions {
    /// Current value of `key`; `None` only for an unset `fft_window_frames`.
    pub fn get(&self, key: OptionKey) -> Option<OptionValue> {
        let value = match key {
            OptionKey::SmoothWindowFrames => OptionValue::Int(self.smooth_window_frames),
            OptionKey::ProminenceRatio => OptionValue::Float(self.prominence_ratio),
            OptionKey::MinProminence => OptionValue::Float(self.min_prominence),
            OptionKey::MaxSlope => OptionValue::Float(self.max_slope),
            OptionKey::BoostSlope => OptionValue::Float(self.boost_slope),
            OptionKey::MinSlope => OptionValue::Float(self.min_slope),
            OptionKey::MergeThresholdMs => OptionValue::Float(self.merge_threshold_ms),
            OptionKey::FftDenoise => OptionValue::Bool(self.fft_denoise),
            OptionKey::FftFramesPerComponent => OptionValue::Int(self.fft_frames_per_component),
            OptionKey::FftWindowFrames => OptionValue::Int(self.fft_window_frames?),
        };
        Some(value)
    }

    /// Set `key` to `value`, clamped into the key's domain.
    pub fn set(&mut self, key: OptionKey, value: OptionValue) -> Result<(), OptionsError> {
        let clamped = key.domain().clamp(value).ok_or_else(|| OptionsError {
            key,
            message: format!("value {value} does not fit this field"),
        })?;
        match (key, clamped) {
            (OptionKey::SmoothWindowFrames, OptionValue::Int(v)) => self.smooth_window_frames = v,
            (OptionKey::ProminenceRatio, OptionValue::Float(v)) => self.prominence_ratio = v,
            (OptionKey::MinProminence, OptionValue::Float(v)) => self.min_prominence = v,
            (OptionKey::MaxSlope, OptionValue::Float(v)) => self.max_slope = v,
            (OptionKey::BoostSlope, OptionValue::Float(v)) => self.boost_slope = v,
            (OptionKey::MinSlope, OptionValue::Float(v)) => self.min_slope = v,
            (OptionKey::MergeThresholdMs, OptionValue::Float(v)) => self.merge_threshold_ms = v,
            (OptionKey::FftDenoise, OptionValue::Bool(v)) => self.fft_denoise = v,
            (OptionKey::FftFramesPerComponent, OptionValue::Int(v)) => {
                self.fft_frames_per_component = v
            }
            (OptionKey::FftWindowFrames, OptionValue::Int(v)) => self.fft_window_frames = Some(v),
            (key, value) => {
                return Err(OptionsError {
                    key,
                    message: format!("value {value} has the wrong kind"),
                })
            }
        }
        Ok(())
    }

    /// Check every field against its domain.
    pub fn validate(&self) -> Result<(), OptionsError> {
        for key in OptionKey::ALL {
            let Some(value) = self.get(key) else {
                continue;
            };
            if !key.domain().contains(value) {
                return Err(OptionsError {
                    key,
                    message: format!("value {value} is outside {:?}", key.domain()),
                });
            }
        }
        Ok(())
    }

    /// Copy with every field clamped into its domain.
    ///
    /// Non-finite floats fall back to the field's default.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        let mut out = self.clone();
        for key in OptionKey::ALL {
            let Some(value) = self.get(key) else {
                continue;
            };
            if out.set(key, value).is_err() {
                if let Some(default) = defaults.get(key) {
                    out.set(key, default).ok();
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let opts = PostprocessOptions::default();
        assert_eq!(opts.smooth_window_frames, 3);
        assert!((opts.prominence_ratio - 0.1).abs() < 1e-12);
        assert_eq!(opts.min_prominence, 0.0);
        assert_eq!(opts.max_slope, 10.0);
        assert_eq!(opts.boost_slope, 7.0);
        assert_eq!(opts.min_slope, 0.0);
        assert_eq!(opts.merge_threshold_ms, 120.0);
        assert!(opts.fft_denoise);
        assert_eq!(opts.fft_frames_per_component, 10);
        assert_eq!(opts.fft_window_frames, None);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_field_names_match_serde() {
        let json = serde_json::to_value(PostprocessOptions::default()).unwrap();
        let object = json.as_object().unwrap();
        for key in OptionKey::ALL {
            assert!(object.contains_key(key.field_name()), "{key} missing");
            assert_eq!(OptionKey::from_field_name(key.field_name()), Some(key));
        }
    }

    #[test]
    fn test_set_clamps_into_domain() {
        let mut opts = PostprocessOptions::default();
        opts.set(OptionKey::ProminenceRatio, OptionValue::Float(3.0))
            .unwrap();
        assert_eq!(opts.prominence_ratio, 1.0);

        opts.set(OptionKey::SmoothWindowFrames, OptionValue::Float(0.2))
            .unwrap();
        assert_eq!(opts.smooth_window_frames, 1);

        opts.set(OptionKey::FftWindowFrames, OptionValue::Int(64))
            .unwrap();
        assert_eq!(opts.fft_window_frames, Some(64));

        assert!(opts
            .set(OptionKey::FftDenoise, OptionValue::Float(1.0))
            .is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let opts = PostprocessOptions {
            prominence_ratio: 1.5,
            ..Default::default()
        };
        let err = opts.validate().unwrap_err();
        assert_eq!(err.key, OptionKey::ProminenceRatio);

        let opts = PostprocessOptions {
            smooth_window_frames: 0,
            ..Default::default()
        };
        assert_eq!(
            opts.validate().unwrap_err().key,
            OptionKey::SmoothWindowFrames
        );
    }

    #[test]
    fn test_clamped_repairs_non_finite() {
        let opts = PostprocessOptions {
            max_slope: f64::NAN,
            min_prominence: -1.0,
            ..Default::default()
        };
        let fixed = opts.clamped();
        assert_eq!(fixed.max_slope, 10.0);
        assert_eq!(fixed.min_prominence, 0.0);
        assert!(fixed.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let opts: PostprocessOptions =
            serde_json::from_str(r#"{ "merge_threshold_ms": 200.0 }"#).unwrap();
        assert_eq!(opts.merge_threshold_ms, 200.0);
        assert_eq!(opts.smooth_window_frames, 3);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn any_float() -> impl Strategy<Value = f64> {
            prop_oneof![
                -1.0e7..1.0e7f64,
                Just(f64::NAN),
                Just(f64::INFINITY),
                Just(f64::NEG_INFINITY),
            ]
        }

        proptest! {
            #[test]
            fn clamped_options_always_validate(
                smooth in any::<u32>(),
                ratio in any_float(),
                floor in any_float(),
                max_slope in any_float(),
                boost in any_float(),
                merge in any_float(),
                hop in any::<u32>(),
                window in proptest::option::of(any::<u32>()),
            ) {
                let opts = PostprocessOptions {
                    smooth_window_frames: smooth,
                    prominence_ratio: ratio,
                    min_prominence: floor,
                    max_slope,
                    boost_slope: boost,
                    merge_threshold_ms: merge,
                    fft_frames_per_component: hop,
                    fft_window_frames: window,
                    ..PostprocessOptions::default()
                };
                let fixed = opts.clamped();
                prop_assert!(fixed.validate().is_ok());
                prop_assert_eq!(fixed.clamped(), fixed);
            }
        }
    }
}
