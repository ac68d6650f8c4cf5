//! Parameter recommendation results.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::options::{OptionKey, OptionValue, OptionsError, PostprocessOptions};

/// Signal analyzers that contribute recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    /// Extrema density and period estimate.
    Frequency,
    /// Amplitude histogram around the centre of the range.
    Intensity,
    /// Roughness of first differences.
    Smoothness,
    /// Typical motion speed and variability.
    Amplitude,
}

impl fmt::Display for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Analyzer::Frequency => "frequency",
            Analyzer::Intensity => "intensity",
            Analyzer::Smoothness => "smoothness",
            Analyzer::Amplitude => "amplitude",
        };
        f.write_str(name)
    }
}

/// Values and rationale proposed by a single analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerProposal {
    pub analyzer: Analyzer,
    pub values: Vec<(OptionKey, OptionValue)>,
    pub rationale: String,
}

impl AnalyzerProposal {
    pub fn new(analyzer: Analyzer, rationale: impl Into<String>) -> Self {
        Self {
            analyzer,
            values: Vec::new(),
            rationale: rationale.into(),
        }
    }

    pub fn with(mut self, key: OptionKey, value: OptionValue) -> Self {
        self.values.push((key, value));
        self
    }
}

/// Suggested option values plus the reasoning behind them.
///
/// A recommendation never touches a job by itself; callers apply values
/// explicitly with [`RecommendationResult::apply`] or
/// [`RecommendationResult::apply_all`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommended_options: BTreeMap<OptionKey, OptionValue>,
    pub reasoning: String,
}

impl RecommendationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an analyzer proposal into this result.
    ///
    /// Values are clamped into their domain. When a key already holds a
    /// different value, the later proposal wins and the refinement is
    /// recorded in the reasoning text.
    pub fn merge(&mut self, proposal: AnalyzerProposal) {
        if !proposal.rationale.is_empty() {
            self.push_reason(&proposal.rationale);
        }
        for (key, value) in proposal.values {
            let Some(value) = key.domain().clamp(value) else {
                self.push_reason(&format!(
                    "Ignored {} suggestion {value} for {key}",
                    proposal.analyzer
                ));
                continue;
            };
            if let Some(previous) = self.recommended_options.insert(key, value) {
                if previous != value {
                    self.push_reason(&format!(
                        "{} analysis refined {key} from {previous} to {value}",
                        capitalize(&proposal.analyzer.to_string())
                    ));
                }
            }
        }
    }

    /// Record a note without proposing values.
    pub fn note(&mut self, text: &str) {
        self.push_reason(text);
    }

    pub fn get(&self, key: OptionKey) -> Option<OptionValue> {
        self.recommended_options.get(&key).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.recommended_options.is_empty()
    }

    /// Apply a single recommended value. Returns `Ok(false)` when this
    /// result has no value for `key`.
    pub fn apply(
        &self,
        key: OptionKey,
        options: &mut PostprocessOptions,
    ) -> Result<bool, OptionsError> {
        match self.get(key) {
            Some(value) => {
                options.set(key, value)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Apply every recommended value; returns how many were applied.
    pub fn apply_all(&self, options: &mut PostprocessOptions) -> Result<usize, OptionsError> {
        let mut applied = 0;
        for (&key, &value) in &self.recommended_options {
            options.set(key, value)?;
            applied += 1;
        }
        Ok(applied)
    }

    fn push_reason(&mut self, text: &str) {
        let text = text.trim().trim_end_matches('.');
        if text.is_empty() {
            return;
        }
        if !self.reasoning.is_empty() {
            self.reasoning.push(' ');
        }
        self.reasoning.push_str(text);
        self.reasoning.push('.');
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_clamps_values() {
        let mut result = RecommendationResult::new();
        result.merge(
            AnalyzerProposal::new(Analyzer::Intensity, "Centre-heavy signal")
                .with(OptionKey::ProminenceRatio, OptionValue::Float(1.7)),
        );
        assert_eq!(
            result.get(OptionKey::ProminenceRatio),
            Some(OptionValue::Float(1.0))
        );
        assert_eq!(result.reasoning, "Centre-heavy signal.");
    }

    #[test]
    fn test_refinement_is_recorded() {
        let mut result = RecommendationResult::new();
        result.merge(
            AnalyzerProposal::new(Analyzer::Frequency, "High extrema density")
                .with(OptionKey::ProminenceRatio, OptionValue::Float(0.15)),
        );
        result.merge(
            AnalyzerProposal::new(Analyzer::Intensity, "Mostly mid-range motion")
                .with(OptionKey::ProminenceRatio, OptionValue::Float(0.18)),
        );
        assert_eq!(
            result.get(OptionKey::ProminenceRatio),
            Some(OptionValue::Float(0.18))
        );
        assert!(result.reasoning.contains("High extrema density."));
        assert!(result
            .reasoning
            .contains("Intensity analysis refined prominence_ratio from 0.150 to 0.180"));
    }

    #[test]
    fn test_apply_single_and_all() {
        let mut result = RecommendationResult::new();
        result.merge(
            AnalyzerProposal::new(Analyzer::Frequency, "")
                .with(OptionKey::MergeThresholdMs, OptionValue::Float(200.0))
                .with(OptionKey::FftFramesPerComponent, OptionValue::Int(12)),
        );

        let mut opts = PostprocessOptions::default();
        assert!(result.apply(OptionKey::MergeThresholdMs, &mut opts).unwrap());
        assert_eq!(opts.merge_threshold_ms, 200.0);
        assert_eq!(opts.fft_frames_per_component, 10);
        assert!(!result.apply(OptionKey::MaxSlope, &mut opts).unwrap());

        let mut opts = PostprocessOptions::default();
        assert_eq!(result.apply_all(&mut opts).unwrap(), 2);
        assert_eq!(opts.fft_frames_per_component, 12);
    }

    #[test]
    fn test_serializes_with_field_names() {
        let mut result = RecommendationResult::new();
        result.merge(
            AnalyzerProposal::new(Analyzer::Smoothness, "Smooth signal")
                .with(OptionKey::MinProminence, OptionValue::Float(0.01)),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["recommended_options"]["min_prominence"].is_number());
        assert_eq!(json["reasoning"], "Smooth signal.");
    }
}
