//! Robust statistics for spike detection.
//!
//! Medians and median-absolute-deviation scale estimates are preferred over
//! mean/stdev here because engagement series are heavy-tailed: a single viral
//! day would inflate a standard deviation enough to mask every other spike.

/// Consistency constant scaling MAD to the standard deviation of normal data
pub const MAD_TO_SIGMA: f64 = 1.4826;

/// Median of a slice, 0 for empty input
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation around a given center
pub fn median_abs_deviation(values: &[f64], center: f64) -> f64 {
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Per-index robust z-score profile over a series.
///
/// All three vectors have the same length as the input series; `sigma` of 0
/// (a locally flat window) forces the z-score to 0 at that index.
#[derive(Clone, Debug)]
pub struct RobustZProfile {
    /// Robust z-score at each index
    pub z: Vec<f64>,
    /// Local median (the baseline) at each index
    pub median: Vec<f64>,
    /// Local MAD-derived scale at each index
    pub sigma: Vec<f64>,
}

/// Compute the local robust z-score profile using a symmetric window.
///
/// For each index the window is `[i - win/2, i + win/2]` clamped to the
/// series bounds. Within it: `med` is the window median, `sigma` is
/// `MAD_TO_SIGMA * mad` (0 when the MAD is 0), and
/// `z = (value - med) / sigma` (0 when sigma is 0, which also guards the
/// division).
pub fn local_robust_z(values: &[f64], win: usize) -> RobustZProfile {
    let n = values.len();
    let half = win / 2;
    let mut profile = RobustZProfile {
        z: vec![0.0; n],
        median: vec![0.0; n],
        sigma: vec![0.0; n],
    };

    for i in 0..n {
        let start = i.saturating_sub(half);
        let end = (i + half).min(n.saturating_sub(1));
        let window = &values[start..=end];

        let med = median(window);
        let mad = median_abs_deviation(window, med);
        let sigma = if mad > 0.0 { MAD_TO_SIGMA * mad } else { 0.0 };

        profile.median[i] = med;
        profile.sigma[i] = sigma;
        profile.z[i] = if sigma > 0.0 {
            (values[i] - med) / sigma
        } else {
            0.0
        };
    }

    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[7.0]), 7.0);
    }

    #[test]
    fn test_median_abs_deviation() {
        // values 1..=5, median 3, |dev| = [2,1,0,1,2], MAD = 1
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(median_abs_deviation(&values, 3.0), 1.0);
    }

    #[test]
    fn test_flat_series_has_zero_z() {
        let values = vec![5.0; 30];
        let profile = local_robust_z(&values, 21);
        assert!(profile.z.iter().all(|&z| z == 0.0));
        assert!(profile.sigma.iter().all(|&s| s == 0.0));
        assert!(profile.median.iter().all(|&m| m == 5.0));
    }

    #[test]
    fn test_spike_gets_positive_z() {
        // Noisy baseline so the MAD is nonzero, plus one large spike
        let mut values: Vec<f64> = (0..40).map(|i| 10.0 + (i % 3) as f64).collect();
        values[20] = 200.0;
        let profile = local_robust_z(&values, 21);

        assert!(profile.z[20] > 3.0, "spike z was {}", profile.z[20]);
        assert!(profile.sigma[20] > 0.0);
        // Far from the spike the series is ordinary
        assert!(profile.z[5].abs() < 3.0);
    }

    #[test]
    fn test_window_clamps_at_edges() {
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let profile = local_robust_z(&values, 21);
        // Window wider than the series degenerates to the whole series
        assert_eq!(profile.median[0], 4.5);
        assert_eq!(profile.median[9], 4.5);
    }

    #[test]
    fn test_profile_lengths_match_input() {
        let values = vec![1.0, 2.0, 3.0];
        let profile = local_robust_z(&values, 8);
        assert_eq!(profile.z.len(), 3);
        assert_eq!(profile.median.len(), 3);
        assert_eq!(profile.sigma.len(), 3);
    }
}
