//! Control-chart (cumulative z) interval detection.
//!
//! The alternative to peak expansion: a trailing-window robust z-score is
//! de-biased with an EMA, accumulated CUSUM-style with decay and a cooldown
//! reset, and intervals open/close through hysteresis thresholds. The
//! emitted intervals feed the same validation and enrichment path as the
//! robust mode.

use crate::stats;

/// Trailing window length for the prior-only baseline
const TRAIL_WINDOW: usize = 21;
/// Exponential leak applied to the accumulator each bin
const DECAY: f64 = 0.8;
/// Small positive excursions below this are ignored by the accumulator
const INCREMENT_FLOOR: f64 = 1.0;
/// Accumulator level that opens an event
const OPEN_THRESHOLD: f64 = 10.0;
/// Accumulator level that closes an event (hysteresis)
const CLOSE_THRESHOLD: f64 = 5.0;
/// Soft-close band: this low for `SOFT_CLOSE_RUN` consecutive bins closes early
const SOFT_CLOSE: f64 = 2.0;
const SOFT_CLOSE_RUN: usize = 2;
/// Consecutive bins with z <= 0 that force the accumulator back to zero
const COOLDOWN_BINS: usize = 3;
/// EMA smoothing factor for drift de-biasing
const EMA_ALPHA: f64 = 0.15;
/// Excess z required at the opening bin
const MIN_OPENING_Z: f64 = 1.5;

/// Event length cap in bins (long series are weekly-binned, so tighter)
fn max_event_bins(long_series: bool) -> usize {
    if long_series {
        12
    } else {
        21
    }
}

/// How far past a closure to look for a "second wind" re-opening
fn lookahead_bins(long_series: bool) -> usize {
    if long_series {
        14
    } else {
        21
    }
}

/// A raw detected interval before validation and enrichment
#[derive(Clone, Debug)]
pub(crate) struct RawInterval {
    pub start_idx: usize,
    pub end_idx: usize,
    /// Bin where the accumulator peaked
    pub peak_idx: usize,
}

/// Robust z of each value against the trailing window that precedes it.
///
/// The window excludes the current value (prior-only) and needs at least 3
/// points before producing a nonzero score.
fn trailing_robust_z(values: &[f64]) -> Vec<f64> {
    let mut z = vec![0.0; values.len()];
    for i in 0..values.len() {
        let start = i.saturating_sub(TRAIL_WINDOW);
        let window = &values[start..i];
        if window.len() < 3 {
            continue;
        }
        let med = stats::median(window);
        let mad = stats::median_abs_deviation(window, med);
        let sigma = if mad > 0.0 { stats::MAD_TO_SIGMA * mad } else { 0.0 };
        if sigma > 0.0 {
            z[i] = (values[i] - med) / sigma;
        }
    }
    z
}

/// Remove slow positive drift from the trailing z via a causal EMA
fn debias(z_trail: &[f64]) -> Vec<f64> {
    let n = z_trail.len();
    let mut ema = vec![0.0; n];
    for t in 0..n {
        ema[t] = if t == 0 {
            z_trail[0]
        } else {
            EMA_ALPHA * z_trail[t] + (1.0 - EMA_ALPHA) * ema[t - 1]
        };
    }
    (0..n)
        .map(|t| z_trail[t] - if t > 0 { ema[t - 1] } else { 0.0 })
        .collect()
}

/// CUSUM-style accumulation with decay, increment floor, and cooldown reset
fn accumulate(z_trail: &[f64], z_excess: &[f64]) -> Vec<f64> {
    let mut c = vec![0.0; z_trail.len()];
    let mut cool = 0usize;
    for t in 0..z_trail.len() {
        let prev = if t > 0 { c[t - 1] } else { 0.0 };
        let inc = (z_excess[t] - INCREMENT_FLOOR).max(0.0);
        cool = if z_trail[t] <= 0.0 { cool + 1 } else { 0 };
        let mut candidate = (DECAY * prev + inc).max(0.0);
        if cool >= COOLDOWN_BINS {
            candidate = 0.0;
        }
        c[t] = candidate;
    }
    c
}

/// Detect raw event intervals on the aggregate series.
///
/// Opens when the accumulator crosses `OPEN_THRESHOLD` with a decent excess
/// z at the opening bin; closes on the hysteresis threshold, a soft-close
/// run, or the length cap. After a closure, a bounded lookahead can pick up
/// a second-wind re-opening and extend the same interval instead of
/// reporting two fragments.
pub(crate) fn detect_intervals(values: &[f64], long_series: bool) -> Vec<RawInterval> {
    let z_trail = trailing_robust_z(values);
    let z_excess = debias(&z_trail);
    let c = accumulate(&z_trail, &z_excess);

    let max_len = max_event_bins(long_series);
    let n = c.len();
    let mut intervals = Vec::new();
    let mut t = 0;
    while t < n {
        while t < n && !(c[t] >= OPEN_THRESHOLD && z_excess[t] >= MIN_OPENING_Z) {
            t += 1;
        }
        if t >= n {
            break;
        }

        let start_idx = t;
        let mut end_idx = t;
        let mut peak_idx = t;
        let mut peak_c = c[t];
        let mut soft_run = 0usize;
        let mut length = 0usize;
        while t < n && c[t] > CLOSE_THRESHOLD && length < max_len {
            if c[t] > peak_c {
                peak_c = c[t];
                peak_idx = t;
            }
            end_idx = t;
            soft_run = if c[t] <= SOFT_CLOSE { soft_run + 1 } else { 0 };
            length += 1;
            t += 1;
            if soft_run >= SOFT_CLOSE_RUN {
                break;
            }
        }

        // Second wind: a fresh opening shortly after closure extends this
        // interval rather than starting a new one
        let lookahead = lookahead_bins(long_series).min(n.saturating_sub(t));
        for j in 0..lookahead {
            if c[t + j] >= OPEN_THRESHOLD && z_excess[t + j] >= MIN_OPENING_Z {
                let mut extend_idx = t + j;
                let mut extend_length = length;
                while extend_idx < n && c[extend_idx] > CLOSE_THRESHOLD && extend_length < max_len {
                    if c[extend_idx] > peak_c {
                        peak_c = c[extend_idx];
                        peak_idx = extend_idx;
                    }
                    end_idx = extend_idx;
                    extend_length += 1;
                    extend_idx += 1;
                }
                t = extend_idx;
                break;
            }
        }

        intervals.push(RawInterval {
            start_idx,
            end_idx,
            peak_idx,
        });
    }
    intervals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_z_is_prior_only() {
        // A step change: the first elevated value is judged against the
        // old baseline, so it scores high even though later values match it
        let mut values: Vec<f64> = (0..30).map(|i| 10.0 + (i % 3) as f64).collect();
        for v in values.iter_mut().skip(20) {
            *v = 100.0;
        }
        let z = trailing_robust_z(&values);
        assert!(z[20] > 3.0, "step onset z was {}", z[20]);
        // Before anything changed the series is ordinary
        assert!(z[10].abs() < 3.0);
    }

    #[test]
    fn test_trailing_z_needs_three_points() {
        let values = vec![1.0, 100.0, 1.0, 100.0];
        let z = trailing_robust_z(&values);
        assert_eq!(z[0], 0.0);
        assert_eq!(z[1], 0.0);
        assert_eq!(z[2], 0.0);
    }

    #[test]
    fn test_cooldown_resets_accumulator() {
        let z_trail = vec![2.0, 2.0, -1.0, -1.0, -1.0, 2.0];
        let z_excess = vec![3.0, 3.0, -1.0, -1.0, -1.0, 3.0];
        let c = accumulate(&z_trail, &z_excess);
        // Three consecutive non-positive bins force a reset
        assert_eq!(c[4], 0.0);
        assert!(c[5] > 0.0);
    }

    #[test]
    fn test_quiet_series_yields_no_intervals() {
        let values: Vec<f64> = (0..60).map(|i| 10.0 + (i % 4) as f64).collect();
        assert!(detect_intervals(&values, false).is_empty());
    }

    #[test]
    fn test_sustained_burst_opens_and_closes() {
        let mut values: Vec<f64> = (0..80).map(|i| 10.0 + (i % 3) as f64).collect();
        for v in values.iter_mut().skip(40).take(6) {
            *v = 500.0;
        }
        let intervals = detect_intervals(&values, false);
        assert_eq!(intervals.len(), 1);
        let interval = &intervals[0];
        assert!(interval.start_idx >= 40, "started at {}", interval.start_idx);
        // Decay plus the length cap bound how far past the burst it runs
        assert!(interval.end_idx < 40 + 21, "ended at {}", interval.end_idx);
        assert!(interval.start_idx <= interval.peak_idx);
        assert!(interval.peak_idx <= interval.end_idx);
    }
}
