//! Descriptive statistics used by the KPI families.
//!
//! Every function here answers "no data" with `None` instead of a numeric
//! placeholder: an empty selection has no mean, and reporting `0.0` would
//! read as "zero revenue".

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ── Percentile helper ─────────────────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using linear
/// interpolation between closest ranks (NumPy's default method).
///
/// Returns `None` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> Option<f64> {
    if sorted_data.is_empty() {
        return None;
    }
    let len = sorted_data.len();
    if len == 1 {
        return Some(sorted_data[0]);
    }
    let rank = (p / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return Some(sorted_data[lo]);
    }
    let frac = rank - lo as f64;
    Some(sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo]))
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Ordering for finite floats; NaN never reaches here because the loader
/// turns it into a missing value.
pub fn total_order(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Central tendency and range of a set of values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values summarised.
    pub count: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
}

impl Summary {
    /// Summarise `values` (order irrelevant).
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(total_order);
        Self {
            count: sorted.len(),
            mean: mean(&sorted),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            median: percentile(&sorted, 50.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── percentile ───────────────────────────────────────────────────────────

    #[test]
    fn test_percentile_empty_returns_none() {
        assert_eq!(percentile(&[], 90.0), None);
    }

    #[test]
    fn test_percentile_single_element() {
        assert_eq!(percentile(&[42.0], 90.0), Some(42.0));
        assert_eq!(percentile(&[42.0], 0.0), Some(42.0));
    }

    #[test]
    fn test_percentile_p50_even() {
        let data = vec![1.0, 2.0, 3.0, 4.0];
        // rank = 0.5 * 3 = 1.5 → interpolate between 2 and 3
        assert!((percentile(&data, 50.0).unwrap() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_p90_ten_elements() {
        let data: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let p90 = percentile(&data, 90.0).unwrap();
        assert!((p90 - 9.1).abs() < 1e-9, "p90 = {p90}");
    }

    // ── mean ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_mean_known() {
        assert!((mean(&[2.0, 4.0, 6.0]).unwrap() - 4.0).abs() < 1e-12);
        assert_eq!(mean(&[]), None);
    }

    // ── Summary ───────────────────────────────────────────────────────────────

    #[test]
    fn test_summary_of_values() {
        let s = Summary::of(&[30.0, 10.0, 20.0, 40.0]);
        assert_eq!(s.count, 4);
        assert_eq!(s.min, Some(10.0));
        assert_eq!(s.max, Some(40.0));
        assert!((s.mean.unwrap() - 25.0).abs() < 1e-12);
        assert!((s.median.unwrap() - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary_empty_is_no_data() {
        let s = Summary::of(&[]);
        assert!(s.is_empty());
        assert_eq!(s.mean, None);
        assert_eq!(s.min, None);
        assert_eq!(s.max, None);
        assert_eq!(s.median, None);
    }
}
