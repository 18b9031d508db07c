//! Boundary expansion, validation gates, and event enrichment.
//!
//! A candidate peak becomes an event by growing a window outward over the
//! aggregate total series while the local robust z-score stays above the
//! mode threshold, then passing the minimum-duration and prominence gates.
//! Candidates that fail a gate are silently dropped; that is expected
//! filtering, not an error.

use super::{DetectorConfig, Event};
use crate::series::Row;
use crate::stats::RobustZProfile;

/// An expanded-but-unvalidated event window.
///
/// `topic` is the topic whose peak produced the candidate; `None` for
/// cumulative-mode intervals, where the association is derived from the
/// window contents instead.
#[derive(Clone, Debug)]
pub(crate) struct WindowCandidate {
    pub start_idx: usize,
    pub end_idx: usize,
    pub peak_idx: usize,
    pub topic: Option<String>,
}

/// Expand left and right from a peak while the z-score stays above `threshold`
pub(crate) fn expand_window(z: &[f64], peak_idx: usize, threshold: f64) -> (usize, usize) {
    let mut start_idx = peak_idx;
    while start_idx > 0 && z[start_idx - 1] > threshold {
        start_idx -= 1;
    }
    let mut end_idx = peak_idx;
    while end_idx + 1 < z.len() && z[end_idx + 1] > threshold {
        end_idx += 1;
    }
    (start_idx, end_idx)
}

/// Minimum of a total-series slice, inclusive on both ends
fn min_over(totals: &[f64], from: usize, to: usize) -> f64 {
    totals[from..=to]
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min)
}

/// Widen a window until it meets the duration floor.
///
/// A locally flat baseline zeroes every sigma, so z-expansion cannot grow
/// the window around an isolated one-day spike; the floor is enforced by
/// stepping outward (alternating right and left, clamped to the series)
/// instead of discarding the spike. Returns `None` only when the whole
/// series is too short to ever meet the floor.
fn widen_to_duration_floor(
    rows: &[Row],
    mut start_idx: usize,
    mut end_idx: usize,
    config: &DetectorConfig,
) -> Option<(usize, usize)> {
    let last = rows.len() - 1;
    let mut extend_right = true;
    while (rows[end_idx].date - rows[start_idx].date).num_days() < config.min_event_duration_days {
        if extend_right && end_idx < last {
            end_idx += 1;
        } else if start_idx > 0 {
            start_idx -= 1;
        } else if end_idx < last {
            end_idx += 1;
        } else {
            return None;
        }
        extend_right = !extend_right;
    }
    Some((start_idx, end_idx))
}

/// Validate a window candidate and build the full event record.
///
/// Gates, in order: minimum duration (with floor widening), then prominence
/// against `prominence_sigma_factor * sigma` at the peak. A zero sigma means
/// a genuinely flat baseline, where any rise is prominent by construction,
/// so the prominence gate is skipped.
pub(crate) fn validate_and_enrich(
    rows: &[Row],
    totals: &[f64],
    profile: &RobustZProfile,
    win: usize,
    candidate: WindowCandidate,
    active_topics: &[String],
    config: &DetectorConfig,
) -> Option<Event> {
    let n = totals.len();
    let half = win / 2;
    let peak_idx = candidate.peak_idx;

    let (start_idx, end_idx) =
        widen_to_duration_floor(rows, candidate.start_idx, candidate.end_idx, config)?;

    // Prominence: the peak must rise clearly above the higher flanking valley
    let left_valley = min_over(totals, start_idx.saturating_sub(half), start_idx);
    let right_valley = min_over(totals, end_idx, (end_idx + half).min(n - 1));
    let valley = left_valley.max(right_valley);
    let prominence = totals[peak_idx] - valley;
    let sigma_at_peak = profile.sigma[peak_idx];
    if sigma_at_peak > 0.0 && prominence < config.prominence_sigma_factor * sigma_at_peak {
        return None;
    }

    // Topic association: the candidate's own topic when it came from a peak,
    // otherwise the topic with the largest count anywhere inside the window
    let (associated_topic, topic_peak_idx) = match candidate.topic {
        Some(topic) => {
            let mut best_idx = peak_idx;
            let mut best_val = f64::NEG_INFINITY;
            for j in start_idx..=end_idx {
                let v = rows[j].topic_count(&topic);
                if v > best_val {
                    best_val = v;
                    best_idx = j;
                }
            }
            (topic, best_idx)
        }
        None => {
            let mut best_topic = active_topics[0].clone();
            let mut best_idx = peak_idx;
            let mut best_val = f64::NEG_INFINITY;
            for topic in active_topics {
                for j in start_idx..=end_idx {
                    let v = rows[j].topic_count(topic);
                    if v > best_val {
                        best_val = v;
                        best_topic = topic.clone();
                        best_idx = j;
                    }
                }
            }
            (best_topic, best_idx)
        }
    };

    // Aggregate maximum inside the window; can differ from the peak since
    // the candidate was found on a single topic's series
    let mut max_idx = start_idx;
    let mut max_val = f64::NEG_INFINITY;
    for j in start_idx..=end_idx {
        if totals[j] > max_val {
            max_val = totals[j];
            max_idx = j;
        }
    }

    let total_engagement: f64 = totals[start_idx..=end_idx].iter().sum();
    let z_peak = profile.z[peak_idx];

    Some(Event {
        start_idx,
        end_idx,
        peak_idx,
        start_date: rows[start_idx].date,
        end_date: rows[end_idx].date,
        peak_date: rows[peak_idx].date,
        peak_value: totals[peak_idx],
        associated_topic,
        topic_peak_idx,
        topic_peak_date: rows[topic_peak_idx].date,
        max_idx,
        max_date: rows[max_idx].date,
        baseline: profile.median[peak_idx],
        z_peak,
        peak_z: z_peak,
        prominence,
        total_engagement,
    })
}
