//! Per-topic peak candidate search.
//!
//! Spikes are often specific to one topic even when the aggregate total is
//! unremarkable, so candidates are searched on each topic's own series and
//! reconciled against the aggregate later during boundary expansion.

use chrono::NaiveDate;
use rayon::prelude::*;

use super::DetectorConfig;
use crate::series::Row;

/// A local-maximum candidate in one topic's series
#[derive(Clone, Debug)]
pub struct Peak {
    /// Index into the row array
    pub idx: usize,
    /// The topic's count at that index
    pub value: f64,
    pub date: NaiveDate,
    /// Topic whose series produced this peak
    pub topic: String,
}

/// Strict local maxima of one topic's series above the relative height floor.
///
/// A candidate at `i` requires `value[i] > value[i-1]`, `value[i] >
/// value[i+1]`, and `value[i] > height_fraction * max`. Plateaus of equal
/// neighbors never qualify, and topics with no positive value are skipped
/// before any scan.
pub fn find_topic_peaks(rows: &[Row], topic: &str, height_fraction: f64) -> Vec<Peak> {
    let values: Vec<f64> = rows.iter().map(|r| r.topic_count(topic)).collect();

    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max > 0.0) {
        return Vec::new();
    }
    let floor = height_fraction * max;

    let mut peaks = Vec::new();
    for i in 1..values.len().saturating_sub(1) {
        if values[i] > values[i - 1] && values[i] > values[i + 1] && values[i] > floor {
            peaks.push(Peak {
                idx: i,
                value: values[i],
                date: rows[i].date,
                topic: topic.to_string(),
            });
        }
    }
    peaks
}

/// Pool peak candidates across all active topics.
///
/// Topic scans are independent and run in parallel; the pooled list is then
/// sorted by value descending (ties broken by index, then topic, so the
/// result is reproducible) and capped at `max_peak_candidates` to bound the
/// cost of boundary expansion.
pub fn find_candidates(
    rows: &[Row],
    active_topics: &[String],
    config: &DetectorConfig,
) -> Vec<Peak> {
    let mut pooled: Vec<Peak> = active_topics
        .par_iter()
        .flat_map_iter(|topic| find_topic_peaks(rows, topic, config.peak_height_fraction))
        .collect();

    pooled.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.idx.cmp(&b.idx))
            .then_with(|| a.topic.cmp(&b.topic))
    });
    pooled.truncate(config.max_peak_candidates);
    pooled
}
