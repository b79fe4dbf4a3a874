//! Resampling statistics for extractor reports.
//!
//! Field accuracy over a few dozen receipts is noisy. Summaries carry a
//! bootstrap confidence interval over per-record accuracy so that a ranking
//! gap can be read against the spread of each extractor's score.
//!
//! # References
//!
//! - Efron & Tibshirani (1993). "An Introduction to the Bootstrap"

use serde::Serialize;

/// Mean and 95% percentile interval of a bootstrap distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BootstrapResult {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl BootstrapResult {
    /// Formats as "mean [lower, upper]".
    pub fn format(&self, precision: usize) -> String {
        format!(
            "{:.prec$} [{:.prec$}, {:.prec$}]",
            self.mean,
            self.lower,
            self.upper,
            prec = precision
        )
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Bootstrap 95% confidence interval for the mean of `values`.
///
/// Resamples `values` with replacement `n_bootstrap` times and takes the
/// 2.5th and 97.5th percentiles of the resample means. The same `seed`
/// always yields the same interval.
///
/// Returns NaN for every bound when `values` is empty or `n_bootstrap` is 0.
///
/// ```
/// use tripeval_core::evaluation::stats::bootstrap_ci;
///
/// let per_record = [1.0, 0.9, 0.75, 1.0, 0.6];
/// let ci = bootstrap_ci(&per_record, 1000, 42);
/// assert!(ci.lower <= ci.mean && ci.mean <= ci.upper);
/// ```
pub fn bootstrap_ci(values: &[f64], n_bootstrap: usize, seed: u64) -> BootstrapResult {
    if values.is_empty() || n_bootstrap == 0 {
        return BootstrapResult {
            mean: f64::NAN,
            lower: f64::NAN,
            upper: f64::NAN,
        };
    }

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let mut rng = LcgRng::new(seed);

    let mut means: Vec<f64> = (0..n_bootstrap)
        .map(|_| {
            let sum: f64 = (0..n).map(|_| values[rng.next_usize(n)]).sum();
            sum / n as f64
        })
        .collect();
    means.sort_by(f64::total_cmp);

    let last = means.len() - 1;
    let lower_idx = ((n_bootstrap as f64) * 0.025) as usize;
    let upper_idx = ((n_bootstrap as f64) * 0.975) as usize;

    BootstrapResult {
        mean,
        lower: means[lower_idx.min(last)],
        upper: means[upper_idx.min(last)],
    }
}

// ============================================================================
// Internal: seeded LCG
// ============================================================================

/// Linear congruential generator (Knuth's MMIX multiplier).
struct LcgRng {
    state: u64,
}

impl LcgRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn next_usize(&mut self, max: usize) -> usize {
        // High bits have the longest period
        ((self.next() >> 33) as usize) % max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_ci_basic() {
        let values = vec![0.85, 0.90, 0.88, 0.92, 0.87, 0.89, 0.91, 0.86, 0.88, 0.90];
        let result = bootstrap_ci(&values, 1000, 42);

        assert!((result.mean - 0.886).abs() < 1e-9);
        assert!(result.lower <= result.mean);
        assert!(result.upper >= result.mean);
        assert!(result.width() > 0.005 && result.width() < 0.1);
    }

    #[test]
    fn test_bootstrap_ci_single_value() {
        let result = bootstrap_ci(&[0.9], 100, 42);
        assert_eq!(result.mean, 0.9);
        assert_eq!(result.lower, 0.9);
        assert_eq!(result.upper, 0.9);
    }

    #[test]
    fn test_bootstrap_ci_empty() {
        let result = bootstrap_ci(&[], 100, 42);
        assert!(result.mean.is_nan());
        assert!(result.lower.is_nan());

        assert!(bootstrap_ci(&[0.5], 0, 42).upper.is_nan());
    }

    #[test]
    fn test_bootstrap_ci_is_reproducible() {
        let values = vec![1.0, 0.5, 0.25, 0.0, 0.75, 1.0, 0.9];
        assert_eq!(bootstrap_ci(&values, 500, 7), bootstrap_ci(&values, 500, 7));
    }

    #[test]
    fn test_bootstrap_bounds_stay_in_range() {
        let values = vec![0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        let result = bootstrap_ci(&values, 1000, 42);
        assert!(result.lower >= 0.0);
        assert!(result.upper <= 1.0);
        assert!(result.width() > 0.0);
    }

    #[test]
    fn test_format() {
        let result = BootstrapResult {
            mean: 0.876,
            lower: 0.8,
            upper: 0.95,
        };
        assert_eq!(result.format(2), "0.88 [0.80, 0.95]");
    }
}
