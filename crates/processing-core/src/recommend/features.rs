//! Signal statistics shared by the analyzers.

use serde::Serialize;

use fungen_signal_model::RawSignal;

use crate::stats;

/// Summary statistics of a raw signal's primary channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalFeatures {
    pub sample_count: usize,
    pub fps: f64,
    pub duration_secs: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    /// Standard deviation of first differences.
    pub diff_std: f64,
    /// Variance of first differences over variance of the signal.
    pub roughness: f64,
    #[serde(skip)]
    values: Vec<f64>,
}

impl SignalFeatures {
    /// Compute features, failing on an empty or non-finite signal.
    pub fn extract(signal: &RawSignal) -> Result<Self, String> {
        let values = signal.primary();
        let Some((min, max)) = stats::min_max(values) else {
            return Err("signal has no samples".to_string());
        };
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(format!("non-finite sample at frame {index}"));
        }

        let diffs = stats::first_differences(values);
        let variance = stats::variance(values);
        let diff_variance = stats::variance(&diffs);
        let roughness = if variance > 0.0 {
            diff_variance / variance
        } else {
            0.0
        };

        Ok(Self {
            sample_count: values.len(),
            fps: signal.fps(),
            duration_secs: signal.duration_secs(),
            min,
            max,
            mean: stats::mean(values),
            std_dev: variance.sqrt(),
            diff_std: diff_variance.sqrt(),
            roughness,
            values: values.to_vec(),
        })
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn is_flat(&self) -> bool {
        stats::is_flat(self.min, self.max)
    }

    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Values rescaled onto `[0, 1]`; all zeros for a flat signal.
    pub fn normalized(&self) -> impl Iterator<Item = f64> + '_ {
        let range = self.range();
        let flat = self.is_flat();
        self.values
            .iter()
            .map(move |v| if flat { 0.0 } else { (v - self.min) / range })
    }
}
