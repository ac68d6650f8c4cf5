//! Arguments shared by several commands.

use std::path::PathBuf;

use clap::Args;

use fungen_signal_model::{ModelRef, PostprocessOptions};

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model name used in artifact names
    #[arg(short, long, default_value = "default")]
    pub model: String,

    /// Model weights file; its size and mtime become part of the cache key
    #[arg(long)]
    pub model_path: Option<PathBuf>,
}

impl ModelArgs {
    pub fn model_ref(&self) -> ModelRef {
        match &self.model_path {
            Some(path) => ModelRef {
                name: self.model.clone(),
                path: Some(path.clone()),
            },
            None => ModelRef::named(self.model.clone()),
        }
    }
}

/// Post-processing overrides on top of defaults or an options file.
#[derive(Args, Debug, Clone, Default)]
pub struct OptionArgs {
    /// JSON file with post-processing options
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Moving-average window in frames
    #[arg(long)]
    pub smooth_window: Option<u32>,

    /// Prominence threshold as a fraction of the signal range
    #[arg(long)]
    pub prominence_ratio: Option<f64>,

    /// Absolute prominence floor
    #[arg(long)]
    pub min_prominence: Option<f64>,

    /// Maximum slope in full strokes per second
    #[arg(long)]
    pub max_slope: Option<f64>,

    /// Slope limit for high-intensity transitions
    #[arg(long)]
    pub boost_slope: Option<f64>,

    /// Drop transitions slower than this
    #[arg(long)]
    pub min_slope: Option<f64>,

    /// Merge extrema closer than this many milliseconds
    #[arg(long)]
    pub merge_threshold_ms: Option<f64>,

    /// Disable the spectral denoise stage
    #[arg(long)]
    pub no_fft_denoise: bool,

    /// Denoise hop in frames
    #[arg(long)]
    pub fft_frames: Option<u32>,

    /// Denoise window in frames (overlapping when larger than the hop)
    #[arg(long)]
    pub fft_window: Option<u32>,
}

impl OptionArgs {
    /// Build validated options.
    pub fn resolve(&self) -> anyhow::Result<PostprocessOptions> {
        let mut options = match &self.options {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to read options file {}: {e}", path.display())
                })?;
                serde_json::from_str(&json).map_err(|e| {
                    anyhow::anyhow!("Invalid options file {}: {e}", path.display())
                })?
            }
            None => PostprocessOptions::default(),
        };

        if let Some(v) = self.smooth_window {
            options.smooth_window_frames = v;
        }
        if let Some(v) = self.prominence_ratio {
            options.prominence_ratio = v;
        }
        if let Some(v) = self.min_prominence {
            options.min_prominence = v;
        }
        if let Some(v) = self.max_slope {
            options.max_slope = v;
        }
        if let Some(v) = self.boost_slope {
            options.boost_slope = v;
        }
        if let Some(v) = self.min_slope {
            options.min_slope = v;
        }
        if let Some(v) = self.merge_threshold_ms {
            options.merge_threshold_ms = v;
        }
        if self.no_fft_denoise {
            options.fft_denoise = false;
        }
        if let Some(v) = self.fft_frames {
            options.fft_frames_per_component = v;
        }
        if self.fft_window.is_some() {
            options.fft_window_frames = self.fft_window;
        }

        options
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid post-processing options: {e}"))?;
        Ok(options)
    }
}
