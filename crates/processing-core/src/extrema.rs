//! Local extrema with topographic prominence.
//!
//! Peaks and troughs are found on the smoothed signal. A flat-topped run of
//! equal samples counts once, positioned at the run's midpoint. Prominence
//! is the drop from the extremum to the higher of the two lowest points
//! reached before meeting a strictly higher sample (or the signal edge) on
//! each side; troughs use the negated signal.

use serde::Serialize;

use crate::stats;

/// Whether an extremum is a local maximum or minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtremumKind {
    Peak,
    Trough,
}

/// One detected turning point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    /// Frame position; plateaus give a half-frame midpoint.
    pub position: f64,
    /// Signal value at the extremum.
    pub value: f64,
    pub kind: ExtremumKind,
    /// Topographic prominence in signal units.
    pub prominence: f64,
}

/// Prominence gate: the larger of the absolute floor and the ratio of range.
pub fn prominence_threshold(range: f64, ratio: f64, min_prominence: f64) -> f64 {
    (ratio * range).max(min_prominence)
}

/// Detect peaks and troughs whose prominence meets the threshold.
///
/// Returns extrema ordered by position. A signal without dynamic range has
/// no extrema.
pub fn detect_extrema(signal: &[f64], prominence_ratio: f64, min_prominence: f64) -> Vec<Extremum> {
    let Some((lo, hi)) = stats::min_max(signal) else {
        return Vec::new();
    };
    if stats::is_flat(lo, hi) {
        return Vec::new();
    }
    let threshold = prominence_threshold(hi - lo, prominence_ratio, min_prominence);

    let negated: Vec<f64> = signal.iter().map(|v| -v).collect();
    let mut found: Vec<Extremum> = prominent_maxima(signal, threshold)
        .map(|(position, sample, prominence)| Extremum {
            position,
            value: signal[sample],
            kind: ExtremumKind::Peak,
            prominence,
        })
        .chain(
            prominent_maxima(&negated, threshold).map(|(position, sample, prominence)| {
                Extremum {
                    position,
                    value: signal[sample],
                    kind: ExtremumKind::Trough,
                    prominence,
                }
            }),
        )
        .collect();

    found.sort_by(|a, b| a.position.total_cmp(&b.position));
    found
}

/// `(position, sample, prominence)` for each maximum at or above `threshold`.
fn prominent_maxima(signal: &[f64], threshold: f64) -> impl Iterator<Item = (f64, usize, f64)> + '_ {
    let walls = HigherNeighbours::new(signal);
    let minima = RangeMin::new(signal);
    local_maxima(signal)
        .into_iter()
        .filter_map(move |(left, right)| {
            let prominence = topographic_prominence(signal, left, right, &walls, &minima);
            (prominence >= threshold && prominence > 0.0)
                .then(|| ((left + right) as f64 / 2.0, left, prominence))
        })
}

/// Plateau-aware local maxima as inclusive `(left, right)` sample ranges.
///
/// Samples at either edge of the signal are never maxima.
pub fn local_maxima(signal: &[f64]) -> Vec<(usize, usize)> {
    let mut maxima = Vec::new();
    if signal.len() < 3 {
        return maxima;
    }
    let last = signal.len() - 1;
    let mut i = 1;
    while i < last {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < last && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                maxima.push((i, ahead - 1));
                i = ahead;
            }
        }
        i += 1;
    }
    maxima
}

fn topographic_prominence(
    signal: &[f64],
    left: usize,
    right: usize,
    walls: &HigherNeighbours,
    minima: &RangeMin,
) -> f64 {
    let height = signal[left];
    let left_start = walls.left[left].map_or(0, |wall| wall + 1);
    let right_end = walls.right[right].map_or(signal.len() - 1, |wall| wall - 1);
    let left_base = minima.query(left_start, left);
    let right_base = minima.query(right, right_end);
    height - left_base.max(right_base)
}

/// Nearest strictly higher sample on each side of every index.
struct HigherNeighbours {
    left: Vec<Option<usize>>,
    right: Vec<Option<usize>>,
}

impl HigherNeighbours {
    fn new(signal: &[f64]) -> Self {
        let n = signal.len();
        let mut left = vec![None; n];
        let mut right = vec![None; n];
        let mut stack: Vec<usize> = Vec::new();

        for i in 0..n {
            while stack.last().is_some_and(|&top| signal[top] <= signal[i]) {
                stack.pop();
            }
            left[i] = stack.last().copied();
            stack.push(i);
        }
        stack.clear();
        for i in (0..n).rev() {
            while stack.last().is_some_and(|&top| signal[top] <= signal[i]) {
                stack.pop();
            }
            right[i] = stack.last().copied();
            stack.push(i);
        }
        Self { left, right }
    }
}

/// Sparse table for O(1) range-minimum queries.
struct RangeMin {
    levels: Vec<Vec<f64>>,
}

impl RangeMin {
    fn new(signal: &[f64]) -> Self {
        let mut levels = vec![signal.to_vec()];
        let mut width = 1;
        while width * 2 <= signal.len() {
            let Some(prev) = levels.last() else { break };
            let next: Vec<f64> = (0..=signal.len() - width * 2)
                .map(|i| prev[i].min(prev[i + width]))
                .collect();
            levels.push(next);
            width *= 2;
        }
        Self { levels }
    }

    /// Minimum over the inclusive range `[lo, hi]`.
    fn query(&self, lo: usize, hi: usize) -> f64 {
        let len = hi - lo + 1;
        let level = (usize::BITS - 1 - len.leading_zeros()) as usize;
        let row = &self.levels[level];
        row[lo].min(row[hi + 1 - (1 << level)])
    }
}
