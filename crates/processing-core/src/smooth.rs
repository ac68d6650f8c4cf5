//! Moving-average smoothing of the denoised signal.

use fungen_signal_model::PostprocessOptions;

/// Available smoothing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmoothingAlgorithm {
    /// Centered moving average over `window` samples, truncated at the edges.
    MovingAverage { window: usize },

    /// Pass values through unchanged.
    None,
}

impl SmoothingAlgorithm {
    /// Algorithm selected by `smooth_window_frames`; a window of 1 means none.
    pub fn from_options(options: &PostprocessOptions) -> Self {
        match options.smooth_window_frames as usize {
            0 | 1 => SmoothingAlgorithm::None,
            window => SmoothingAlgorithm::MovingAverage { window },
        }
    }

    /// Smooth `signal`, returning a vector of the same length.
    ///
    /// A signal shorter than the window is returned unchanged.
    pub fn apply(self, signal: &[f64]) -> Vec<f64> {
        match self {
            SmoothingAlgorithm::MovingAverage { window } if signal.len() >= window => {
                moving_average(signal, window)
            }
            _ => signal.to_vec(),
        }
    }
}

/// Centered moving average of exactly `window` samples away from the edges.
///
/// Even windows lean one sample to the right.
pub fn moving_average(signal: &[f64], window: usize) -> Vec<f64> {
    if signal.is_empty() || window <= 1 {
        return signal.to_vec();
    }

    let left = (window - 1) / 2;
    let right = window / 2;

    let mut prefix = Vec::with_capacity(signal.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in signal {
        acc += v;
        prefix.push(acc);
    }

    (0..signal.len())
        .map(|i| {
            let start = i.saturating_sub(left);
            let end = (i + right + 1).min(signal.len());
            (prefix[end] - prefix[start]) / (end - start) as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jittery() -> Vec<f64> {
        vec![0.50, 0.53, 0.48, 0.52, 0.49, 0.51, 0.50]
    }

    #[test]
    fn test_moving_average_reduces_jitter() {
        let raw = jittery();
        let smoothed = moving_average(&raw, 3);
        assert_eq!(smoothed.len(), raw.len());
        for v in &smoothed[1..smoothed.len() - 1] {
            assert!((v - 0.5).abs() < 0.02, "smoothed {v} too far from centre");
        }
    }

    #[test]
    fn test_window_one_is_identity() {
        let raw = jittery();
        let opts = PostprocessOptions {
            smooth_window_frames: 1,
            ..Default::default()
        };
        assert_eq!(SmoothingAlgorithm::from_options(&opts), SmoothingAlgorithm::None);
        assert_eq!(SmoothingAlgorithm::from_options(&opts).apply(&raw), raw);
    }

    #[test]
    fn test_short_signal_skips_smoothing() {
        let raw = vec![1.0, 5.0, 2.0];
        let algo = SmoothingAlgorithm::MovingAverage { window: 8 };
        assert_eq!(algo.apply(&raw), raw);
    }

    #[test]
    fn test_edges_average_available_samples() {
        let smoothed = moving_average(&[0.0, 3.0, 6.0, 9.0], 3);
        assert!((smoothed[0] - 1.5).abs() < 1e-12);
        assert!((smoothed[1] - 3.0).abs() < 1e-12);
        assert!((smoothed[3] - 7.5).abs() < 1e-12);
    }

    #[test]
    fn test_even_window_width() {
        // window 4 covers i-1..=i+2
        let smoothed = moving_average(&[0.0, 4.0, 8.0, 12.0, 16.0], 4);
        assert!((smoothed[1] - 6.0).abs() < 1e-12);
    }
}
