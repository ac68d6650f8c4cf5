//! Windowed frequency-domain denoising.
//!
//! The signal is cut into windows of `fft_frames_per_component` samples, or
//! `fft_window_frames` samples stepped by `fft_frames_per_component` when an
//! overlapping window is configured. Each window is detrended along the line
//! joining its endpoints, transformed with a real DFT, stripped of every bin
//! above [`DENOISE_CUTOFF_FRACTION`] of Nyquist and transformed back with the
//! trend restored. Overlapping windows are blended with Hann weights.

use std::f64::consts::PI;

use fungen_signal_model::PostprocessOptions;

/// Fraction of the Nyquist band kept by the low-pass.
pub const DENOISE_CUTOFF_FRACTION: f64 = 0.5;

/// Windows shorter than this pass through untouched.
const MIN_WINDOW: usize = 3;

/// Window geometry for [`denoise`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenoiseConfig {
    /// Step between window starts.
    pub hop: usize,
    /// Window length; equal to `hop` for disjoint windows.
    pub window: usize,
    /// Kept fraction of the Nyquist band.
    pub cutoff_fraction: f64,
}

impl DenoiseConfig {
    pub fn from_options(options: &PostprocessOptions) -> Self {
        let hop = options.fft_frames_per_component.max(1) as usize;
        let window = options
            .fft_window_frames
            .map(|w| w as usize)
            .filter(|&w| w > hop)
            .unwrap_or(hop);
        Self {
            hop,
            window,
            cutoff_fraction: DENOISE_CUTOFF_FRACTION,
        }
    }
}

/// Low-pass `signal` window by window.
///
/// Signals shorter than one window are returned unchanged, as are windows
/// too short to carry any discardable band.
pub fn denoise(signal: &[f64], config: &DenoiseConfig) -> Vec<f64> {
    let n = signal.len();
    if config.window < MIN_WINDOW || n < config.window {
        return signal.to_vec();
    }

    if config.window == config.hop {
        let mut out = Vec::with_capacity(n);
        for chunk in signal.chunks(config.window) {
            out.extend(lowpass_window(chunk, config.cutoff_fraction));
        }
        return out;
    }

    let mut acc = vec![0.0; n];
    let mut weight = vec![0.0; n];
    let mut start = 0;
    loop {
        let end = (start + config.window).min(n);
        let segment = &signal[start..end];
        let filtered = lowpass_window(segment, config.cutoff_fraction);
        for (offset, value) in filtered.iter().enumerate() {
            let w = hann_weight(offset, segment.len());
            acc[start + offset] += w * value;
            weight[start + offset] += w;
        }
        if end == n {
            break;
        }
        start += config.hop;
    }

    acc.iter()
        .zip(&weight)
        .zip(signal)
        .map(|((a, w), original)| if *w > 0.0 { a / w } else { *original })
        .collect()
}

/// Hann weight sampled at bin centres, so it never reaches zero.
fn hann_weight(offset: usize, len: usize) -> f64 {
    0.5 - 0.5 * (2.0 * PI * (offset as f64 + 0.5) / len as f64).cos()
}

/// Detrend, drop the upper band, restore the trend.
fn lowpass_window(segment: &[f64], cutoff_fraction: f64) -> Vec<f64> {
    let n = segment.len();
    if n < MIN_WINDOW {
        return segment.to_vec();
    }

    let first = segment[0];
    let slope = (segment[n - 1] - first) / (n - 1) as f64;
    let trend = |t: usize| first + slope * t as f64;
    let residual: Vec<f64> = segment
        .iter()
        .enumerate()
        .map(|(t, v)| v - trend(t))
        .collect();

    let nyquist = n / 2;
    let keep = ((nyquist as f64) * cutoff_fraction).floor() as usize;

    // Forward transform of the kept bins only.
    let step = 2.0 * PI / n as f64;
    let bins: Vec<(f64, f64)> = (0..=keep)
        .map(|k| {
            residual
                .iter()
                .enumerate()
                .fold((0.0, 0.0), |(re, im), (t, v)| {
                    let angle = step * (k * t) as f64;
                    (re + v * angle.cos(), im - v * angle.sin())
                })
        })
        .collect();

    (0..n)
        .map(|t| {
            let mut value = bins[0].0 / n as f64;
            for (k, (re, im)) in bins.iter().enumerate().skip(1) {
                let angle = step * (k * t) as f64;
                // The Nyquist bin of an even window has no mirrored twin.
                let scale = if n % 2 == 0 && k == nyquist { 1.0 } else { 2.0 };
                value += scale * (re * angle.cos() - im * angle.sin()) / n as f64;
            }
            value + trend(t)
        })
        .collect()
}
