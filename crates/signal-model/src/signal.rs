//! Raw per-frame signal produced by the external inference step.

/// Name of the channel the post-processor reads.
pub const PRIMARY_CHANNEL: &str = "predicted_change";

/// One named column of per-frame values.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalChannel {
    pub name: String,
    pub values: Vec<f64>,
}

impl SignalChannel {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Per-frame numeric output of inference at a fixed frame rate.
///
/// Built once per fingerprint and never mutated afterwards; every channel
/// has the same number of samples.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSignal {
    fps: f64,
    channels: Vec<SignalChannel>,
}

impl RawSignal {
    /// Create a signal from one or more channels of equal length.
    pub fn new(fps: f64, channels: Vec<SignalChannel>) -> Result<Self, SignalError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(SignalError::InvalidFrameRate(fps));
        }
        let Some(first) = channels.first() else {
            return Err(SignalError::NoChannels);
        };
        let expected = first.values.len();
        if let Some(bad) = channels.iter().find(|c| c.values.len() != expected) {
            return Err(SignalError::ChannelLengthMismatch {
                name: bad.name.clone(),
                expected,
                actual: bad.values.len(),
            });
        }
        Ok(Self { fps, channels })
    }

    /// Single-channel signal using the primary channel name.
    pub fn from_values(fps: f64, values: Vec<f64>) -> Result<Self, SignalError> {
        Self::new(fps, vec![SignalChannel::new(PRIMARY_CHANNEL, values)])
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn sample_count(&self) -> usize {
        self.channels[0].values.len()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[SignalChannel] {
        &self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    /// Values of the channel the pipeline consumes.
    ///
    /// This is the channel named [`PRIMARY_CHANNEL`] when present,
    /// otherwise the first channel.
    pub fn primary(&self) -> &[f64] {
        self.channels
            .iter()
            .find(|c| c.name == PRIMARY_CHANNEL)
            .unwrap_or(&self.channels[0])
            .values
            .as_slice()
    }

    /// Look up a channel by name.
    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Milliseconds per frame.
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Timestamp of a (possibly fractional) frame index in milliseconds.
    pub fn timestamp_ms(&self, frame: f64) -> f64 {
        frame * self.frame_ms()
    }

    /// Total covered duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.sample_count() as f64 / self.fps
    }
}

/// Errors raised while constructing a [`RawSignal`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalError {
    #[error("signal has no channels")]
    NoChannels,

    #[error("channel {name} has {actual} samples, expected {expected}")]
    ChannelLengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid frame rate {0}")]
    InvalidFrameRate(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_channel_signal() {
        let signal = RawSignal::from_values(30.0, vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(signal.sample_count(), 3);
        assert_eq!(signal.channel_count(), 1);
        assert_eq!(signal.primary(), &[0.0, 0.5, 1.0]);
        assert!((signal.timestamp_ms(3.0) - 100.0).abs() < 1e-9);
        assert!((signal.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_primary_prefers_named_channel() {
        let signal = RawSignal::new(
            60.0,
            vec![
                SignalChannel::new("confidence", vec![1.0, 1.0]),
                SignalChannel::new(PRIMARY_CHANNEL, vec![0.2, 0.4]),
            ],
        )
        .unwrap();
        assert_eq!(signal.primary(), &[0.2, 0.4]);
        assert_eq!(signal.channel("confidence"), Some(&[1.0, 1.0][..]));
    }

    #[test]
    fn test_rejects_mismatched_channels() {
        let err = RawSignal::new(
            30.0,
            vec![
                SignalChannel::new("a", vec![0.0, 1.0]),
                SignalChannel::new("b", vec![0.0]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SignalError::ChannelLengthMismatch { .. }));
    }

    #[test]
    fn test_rejects_bad_frame_rate() {
        assert_eq!(
            RawSignal::from_values(0.0, vec![1.0]).unwrap_err(),
            SignalError::InvalidFrameRate(0.0)
        );
        assert_eq!(
            RawSignal::new(30.0, vec![]).unwrap_err(),
            SignalError::NoChannels
        );
    }
}
