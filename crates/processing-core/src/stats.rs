//! Small numeric helpers shared by the pipeline stages and analyzers.

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// `(min, max)` of a non-empty slice.
pub(crate) fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Whether a range is indistinguishable from zero for values of this scale.
pub(crate) fn is_flat(lo: f64, hi: f64) -> bool {
    let scale = lo.abs().max(hi.abs()).max(1.0);
    hi - lo <= scale * 1e-9
}

pub(crate) fn first_differences(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Prefix sums with a leading zero, for O(1) range means.
#[derive(Debug)]
pub(crate) struct PrefixSums {
    sums: Vec<f64>,
}

impl PrefixSums {
    pub(crate) fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut sums = vec![0.0];
        let mut acc = 0.0;
        for v in values {
            acc += v;
            sums.push(acc);
        }
        Self { sums }
    }

    pub(crate) fn len(&self) -> usize {
        self.sums.len() - 1
    }

    /// Mean over the inclusive index range `[lo, hi]`, clamped to the data.
    pub(crate) fn mean(&self, lo: usize, hi: usize) -> f64 {
        let n = self.len();
        if n == 0 {
            return 0.0;
        }
        let hi = hi.min(n - 1);
        let lo = lo.min(hi);
        (self.sums[hi + 1] - self.sums[lo]) / (hi + 1 - lo) as f64
    }
}
