//! Merging of extrema that sit too close together in time.

use crate::extrema::Extremum;
use crate::stats::PrefixSums;

/// Width of the neighbourhood whose mean decides which extremum survives.
pub const LOCAL_MEAN_WINDOW_MS: f64 = 1000.0;

/// Collapses close extrema, keeping the one that deviates most from the
/// local mean of the signal around the pair.
pub struct ExtremaMerger {
    threshold_ms: f64,
    frame_ms: f64,
    sums: PrefixSums,
}

impl ExtremaMerger {
    /// `signal` is the smoothed signal the extrema were taken from.
    pub fn new(signal: &[f64], frame_ms: f64, threshold_ms: f64) -> Self {
        Self {
            threshold_ms,
            frame_ms,
            sums: PrefixSums::new(signal.iter().copied()),
        }
    }

    /// Merge extrema ordered by position.
    ///
    /// The output has every adjacent pair at least `threshold_ms` apart, so a
    /// second pass over it changes nothing. On equal deviation the later
    /// extremum wins.
    pub fn merge(&self, extrema: &[Extremum]) -> Vec<Extremum> {
        if self.threshold_ms <= 0.0 {
            return extrema.to_vec();
        }

        let mut kept: Vec<Extremum> = Vec::with_capacity(extrema.len());
        for &candidate in extrema {
            let mut current = candidate;
            while let Some(&last) = kept.last() {
                if self.gap_ms(&last, &current) >= self.threshold_ms {
                    break;
                }
                kept.pop();
                current = self.winner(last, current);
            }
            kept.push(current);
        }
        kept
    }

    fn gap_ms(&self, a: &Extremum, b: &Extremum) -> f64 {
        (b.position - a.position).abs() * self.frame_ms
    }

    fn winner(&self, earlier: Extremum, later: Extremum) -> Extremum {
        let centre = (earlier.position + later.position) / 2.0;
        let mean = self.local_mean(centre);
        if (later.value - mean).abs() >= (earlier.value - mean).abs() {
            later
        } else {
            earlier
        }
    }

    /// Mean of the signal within half of [`LOCAL_MEAN_WINDOW_MS`] of `centre`.
    fn local_mean(&self, centre: f64) -> f64 {
        let n = self.sums.len();
        if n == 0 {
            return 0.0;
        }
        let radius = LOCAL_MEAN_WINDOW_MS / 2.0 / self.frame_ms;
        let lo = (centre - radius).floor().max(0.0) as usize;
        let hi = ((centre + radius).ceil().max(0.0) as usize).min(n - 1);
        self.sums.mean(lo, hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::ExtremumKind;

    fn ext(position: f64, value: f64, kind: ExtremumKind) -> Extremum {
        Extremum {
            position,
            value,
            kind,
            prominence: 1.0,
        }
    }

    #[test]
    fn test_close_pair_keeps_larger_deviation() {
        let signal = vec![0.0; 100];
        let merger = ExtremaMerger::new(&signal, 10.0, 120.0);
        let merged = merger.merge(&[
            ext(10.0, 0.4, ExtremumKind::Peak),
            ext(15.0, -0.9, ExtremumKind::Trough),
            ext(60.0, 0.8, ExtremumKind::Peak),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].value, -0.9);
        assert_eq!(merged[1].value, 0.8);
    }

    #[test]
    fn test_tie_prefers_later() {
        let signal = vec![0.0; 50];
        let merger = ExtremaMerger::new(&signal, 10.0, 120.0);
        let merged = merger.merge(&[
            ext(10.0, 0.5, ExtremumKind::Peak),
            ext(12.0, -0.5, ExtremumKind::Trough),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].position, 12.0);
    }

    #[test]
    fn test_cascading_merge_leaves_no_close_pairs() {
        let signal = vec![0.0; 200];
        let merger = ExtremaMerger::new(&signal, 10.0, 100.0);
        let input: Vec<Extremum> = (0..12)
            .map(|i| ext(i as f64 * 4.0, (i % 5) as f64, ExtremumKind::Peak))
            .collect();
        let merged = merger.merge(&input);
        for pair in merged.windows(2) {
            assert!((pair[1].position - pair[0].position) * 10.0 >= 100.0);
        }
        assert_eq!(merger.merge(&merged), merged);
    }

    #[test]
    fn test_zero_threshold_is_identity() {
        let signal = vec![0.0; 10];
        let merger = ExtremaMerger::new(&signal, 10.0, 0.0);
        let input = vec![
            ext(1.0, 1.0, ExtremumKind::Peak),
            ext(2.0, -1.0, ExtremumKind::Trough),
        ];
        assert_eq!(merger.merge(&input), input);
    }
}
