//! Percentile bounds of a sorted bootstrap column.

use serde::{Deserialize, Serialize};

/// Products this close to an integer are treated as that integer before
/// taking ceil/floor, so `20 * 0.05` lands on rank 1 rather than 2.
const RANK_SNAP_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileMethod {
    /// Lower bound at rank `ceil(B·t)`, upper at rank `floor(B·(1-t))`,
    /// with `t = (1 - level) / 2` and 1-based ranks.
    #[default]
    NearestRank,
    /// Linear interpolation between the two closest ranks.
    Linear,
}

impl PercentileMethod {
    /// Lower and upper bound of `sorted` (ascending, non-empty) at `confidence_level`.
    pub fn bounds(self, sorted: &[f64], confidence_level: f64) -> (f64, f64) {
        debug_assert!(!sorted.is_empty());
        let tail = (1.0 - confidence_level) / 2.0;
        match self {
            Self::NearestRank => {
                let (lo, hi) = nearest_rank_indices(sorted.len(), confidence_level);
                (sorted[lo], sorted[hi])
            }
            Self::Linear => (
                interpolated(sorted, tail),
                interpolated(sorted, 1.0 - tail),
            ),
        }
    }
}

fn snap(x: f64) -> f64 {
    let nearest = x.round();
    if (x - nearest).abs() < RANK_SNAP_TOLERANCE {
        nearest
    } else {
        x
    }
}

/// Zero-based indices of the nearest-rank bounds for a column of `len` values.
///
/// If the interval is narrower than one rank the two ranks would cross; both
/// bounds then collapse onto the upper rank, giving a zero-width interval.
pub fn nearest_rank_indices(len: usize, confidence_level: f64) -> (usize, usize) {
    let b = len as f64;
    let tail = (1.0 - confidence_level) / 2.0;
    let lower_rank = (snap(b * tail).ceil() as usize).clamp(1, len);
    let upper_rank = (snap(b * (1.0 - tail)).floor() as usize).clamp(1, len);
    let lower_rank = lower_rank.min(upper_rank);
    (lower_rank - 1, upper_rank - 1)
}

/// Linearly interpolated quantile `q` of an ascending slice.
pub fn interpolated(sorted: &[f64], q: f64) -> f64 {
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    let frac = position - below as f64;
    sorted[below] + frac * (sorted[above] - sorted[below])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn one_to(n: usize) -> Vec<f64> {
        (1..=n).map(|v| v as f64).collect()
    }

    #[test]
    fn nearest_rank_matches_rank_formula() {
        assert_eq!(nearest_rank_indices(20, 0.90), (0, 18));
        assert_eq!(nearest_rank_indices(100, 0.95), (2, 96));
        assert_eq!(nearest_rank_indices(50, 0.99), (0, 48));
        assert_eq!(nearest_rank_indices(400, 0.90), (19, 379));
    }

    #[test]
    fn single_value_collapses() {
        assert_eq!(nearest_rank_indices(1, 0.95), (0, 0));
        let (lo, hi) = PercentileMethod::Linear.bounds(&[0.91], 0.95);
        assert_eq!((lo, hi), (0.91, 0.91));
    }

    #[test]
    fn crossing_ranks_collapse_to_zero_width() {
        // B = 3, level = 0.1: ranks ceil(1.35) = 2 and floor(1.65) = 1.
        let (lo, hi) = nearest_rank_indices(3, 0.1);
        assert_eq!(lo, hi);
        assert_eq!(hi, 0);
    }

    #[test]
    fn bounds_never_cross() {
        for len in 1..60 {
            for level in [0.01, 0.1, 0.5, 0.8, 0.9, 0.95, 0.99] {
                let values = one_to(len);
                for method in [PercentileMethod::NearestRank, PercentileMethod::Linear] {
                    let (lo, hi) = method.bounds(&values, level);
                    assert!(lo <= hi, "{method:?} len={len} level={level}");
                }
            }
        }
    }

    #[test]
    fn wider_level_never_narrows() {
        for len in 1..80 {
            let values: Vec<f64> = one_to(len).iter().map(|v| v * v).collect();
            for method in [PercentileMethod::NearestRank, PercentileMethod::Linear] {
                let (lo80, hi80) = method.bounds(&values, 0.80);
                let (lo99, hi99) = method.bounds(&values, 0.99);
                assert!(hi99 - lo99 >= hi80 - lo80, "{method:?} len={len}");
            }
        }
    }

    #[test]
    fn linear_matches_interpolated_percentile() {
        let values = one_to(5);
        assert_abs_diff_eq!(interpolated(&values, 0.5), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolated(&values, 0.025), 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(interpolated(&values, 0.975), 4.9, epsilon = 1e-12);
        let (lo, hi) = PercentileMethod::Linear.bounds(&values, 0.95);
        assert_abs_diff_eq!(lo, 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(hi, 4.9, epsilon = 1e-12);
    }
}
