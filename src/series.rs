//! Time-series rows, weekly binning, and record loading.
//!
//! Raw per-date records arrive as a date plus arbitrary topic-keyed counts.
//! This module normalizes them into [`Row`]s restricted to the active topic
//! set, optionally re-bins long series into ISO weeks, and provides a lenient
//! JSON loader that skips malformed entries instead of failing the whole
//! input.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Date format accepted by the lenient JSON loader
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading raw records
#[derive(Debug, Error)]
pub enum SeriesError {
    /// Input was valid JSON but not an array of records
    #[error("expected a JSON array of records, got {0}")]
    NotAnArray(&'static str),

    /// Input was not valid JSON at all
    #[error("failed to parse JSON input: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Core Types
// ============================================================================

/// One raw input record: a calendar day plus per-topic activity counts.
///
/// Not every topic needs to appear in every record; an absent topic means an
/// implicit count of 0 for that day.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    /// Calendar day this record covers
    pub date: NaiveDate,
    /// Topic identifier -> activity count for that day
    #[serde(flatten)]
    pub counts: HashMap<String, f64>,
}

impl TimeSeriesRecord {
    /// Create a record from a date and (topic, count) pairs
    pub fn new(date: NaiveDate, counts: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            date,
            counts: counts.into_iter().collect(),
        }
    }
}

/// A normalized per-date row restricted to the active topic set.
///
/// `total` is the sum over exactly the active topics, not over every field
/// the raw record happened to carry.
#[derive(Clone, Debug)]
pub struct Row {
    /// Calendar day (or Monday of the ISO week after binning)
    pub date: NaiveDate,
    /// Per-topic counts for the active topics only
    pub topics: HashMap<String, f64>,
    /// Sum of the active-topic counts
    pub total: f64,
}

impl Row {
    /// Count for a topic, 0 if the topic is absent
    #[inline]
    pub fn topic_count(&self, topic: &str) -> f64 {
        self.topics.get(topic).copied().unwrap_or(0.0)
    }
}

// ============================================================================
// Row Building
// ============================================================================

/// Clamp a raw count into the valid domain.
///
/// Non-finite and negative counts carry no usable signal and are treated as 0
/// so they cannot propagate NaN through the z-score math downstream.
#[inline]
fn sanitize_count(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Build ascending-by-date rows from raw records, restricted to `active_topics`.
///
/// Duplicate dates are kept as-is at this stage; weekly binning aggregates
/// them when it triggers. Zero-total rows are kept too, since gaps in
/// activity are part of the baseline the detector measures against.
pub fn build_rows(records: &[TimeSeriesRecord], active_topics: &[String]) -> Vec<Row> {
    let mut rows: Vec<Row> = records
        .iter()
        .map(|record| {
            let topics: HashMap<String, f64> = active_topics
                .iter()
                .map(|topic| {
                    let count = record.counts.get(topic).copied().unwrap_or(0.0);
                    (topic.clone(), sanitize_count(count))
                })
                .collect();
            let total = active_topics.iter().map(|t| topics[t]).sum();
            Row {
                date: record.date,
                topics,
                total,
            }
        })
        .collect();

    rows.sort_by_key(|row| row.date);
    rows
}

// ============================================================================
// Weekly Binning
// ============================================================================

/// Monday of the ISO week containing `date`
#[inline]
pub fn week_floor(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Re-bin rows into ISO weeks (Monday-anchored) when the series is long.
///
/// Series at or below `threshold` rows are returned unchanged. Above it,
/// rows falling in the same week are summed per topic and the total is
/// recomputed from the active-topic sum. Long daily series have far noisier
/// day-to-day swings; trading resolution for stability keeps the local
/// z-scores meaningful.
pub fn maybe_bin_weekly(
    rows: Vec<Row>,
    active_topics: &[String],
    threshold: usize,
) -> Vec<Row> {
    if rows.len() <= threshold {
        return rows;
    }

    // BTreeMap keeps the weeks in ascending date order
    let mut weeks: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
    for row in &rows {
        let bucket = weeks.entry(week_floor(row.date)).or_default();
        for topic in active_topics {
            *bucket.entry(topic.clone()).or_insert(0.0) += row.topic_count(topic);
        }
    }

    let binned: Vec<Row> = weeks
        .into_iter()
        .map(|(date, topics)| {
            let total = active_topics
                .iter()
                .map(|t| topics.get(t).copied().unwrap_or(0.0))
                .sum();
            Row {
                date,
                topics,
                total,
            }
        })
        .collect();

    tracing::debug!(
        "Binned {} daily rows into {} weekly rows",
        rows.len(),
        binned.len()
    );

    binned
}

/// Number of calendar days covered by the rows (last date minus first)
pub fn span_days(rows: &[Row]) -> i64 {
    match (rows.first(), rows.last()) {
        (Some(first), Some(last)) => (last.date - first.date).num_days(),
        _ => 0,
    }
}

// ============================================================================
// Record Loading
// ============================================================================

/// Parse a JSON array of `{"date": "YYYY-MM-DD", "<topic>": count, ...}`
/// objects into records.
///
/// Malformed entries are skipped with a logged diagnostic rather than
/// failing the load: objects without a parsable date are dropped, and
/// non-numeric count fields are ignored (implicit 0). Only a structurally
/// invalid document (not JSON, or not an array) is an error.
pub fn records_from_json(input: &str) -> Result<Vec<TimeSeriesRecord>, SeriesError> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    let entries = match value {
        serde_json::Value::Array(entries) => entries,
        serde_json::Value::Object(_) => return Err(SeriesError::NotAnArray("an object")),
        _ => return Err(SeriesError::NotAnArray("a scalar")),
    };

    let entry_count = entries.len();
    let mut records = Vec::with_capacity(entry_count);
    for (index, entry) in entries.into_iter().enumerate() {
        let Some(object) = entry.as_object() else {
            tracing::warn!("Skipping record {}: not a JSON object", index);
            continue;
        };

        let date = object
            .get("date")
            .and_then(|v| v.as_str())
            .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok());
        let Some(date) = date else {
            tracing::warn!("Skipping record {}: missing or unparsable date", index);
            continue;
        };

        let counts: HashMap<String, f64> = object
            .iter()
            .filter(|(key, _)| key.as_str() != "date")
            .filter_map(|(key, v)| v.as_f64().map(|n| (key.clone(), sanitize_count(n))))
            .collect();

        records.push(TimeSeriesRecord { date, counts });
    }

    tracing::debug!(
        "Loaded {} records ({} entries skipped)",
        records.len(),
        entry_count - records.len()
    );

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate, counts: &[(&str, f64)]) -> TimeSeriesRecord {
        TimeSeriesRecord::new(d, counts.iter().map(|(t, v)| (t.to_string(), *v)))
    }

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_rows_sorts_and_totals() {
        let records = vec![
            record(date(2024, 3, 2), &[("healthcare", 5.0), ("economy", 3.0)]),
            record(date(2024, 3, 1), &[("healthcare", 2.0), ("ignored", 99.0)]),
        ];
        let rows = build_rows(&records, &topics(&["healthcare", "economy"]));

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, date(2024, 3, 1));
        // "ignored" is not an active topic and must not count toward the total
        assert_eq!(rows[0].total, 2.0);
        assert_eq!(rows[1].total, 8.0);
        assert_eq!(rows[0].topic_count("economy"), 0.0);
    }

    #[test]
    fn test_build_rows_sanitizes_bad_counts() {
        let records = vec![record(
            date(2024, 3, 1),
            &[("a", -4.0), ("b", f64::NAN), ("c", f64::INFINITY), ("d", 7.0)],
        )];
        let rows = build_rows(&records, &topics(&["a", "b", "c", "d"]));

        assert_eq!(rows[0].topic_count("a"), 0.0);
        assert_eq!(rows[0].topic_count("b"), 0.0);
        assert_eq!(rows[0].topic_count("c"), 0.0);
        assert_eq!(rows[0].total, 7.0);
    }

    #[test]
    fn test_build_rows_empty_input() {
        let rows = build_rows(&[], &topics(&["a"]));
        assert!(rows.is_empty());
    }

    #[test]
    fn test_week_floor_is_monday() {
        // 2024-03-07 is a Thursday; its week starts Monday 2024-03-04
        assert_eq!(week_floor(date(2024, 3, 7)), date(2024, 3, 4));
        assert_eq!(week_floor(date(2024, 3, 4)), date(2024, 3, 4));
        assert_eq!(week_floor(date(2024, 3, 10)), date(2024, 3, 4));
    }

    #[test]
    fn test_binning_below_threshold_is_identity() {
        let records = vec![
            record(date(2024, 3, 1), &[("a", 1.0)]),
            record(date(2024, 3, 2), &[("a", 2.0)]),
        ];
        let active = topics(&["a"]);
        let rows = build_rows(&records, &active);
        let binned = maybe_bin_weekly(rows.clone(), &active, 400);
        assert_eq!(binned.len(), rows.len());
        assert_eq!(binned[0].date, date(2024, 3, 1));
    }

    #[test]
    fn test_binning_sums_per_topic_and_recomputes_total() {
        // Mon 2024-03-04 through Sun 2024-03-10 all land in one week
        let active = topics(&["a", "b"]);
        let records: Vec<TimeSeriesRecord> = (4..=10)
            .map(|day| record(date(2024, 3, day), &[("a", 1.0), ("b", 2.0)]))
            .collect();
        let rows = build_rows(&records, &active);
        let binned = maybe_bin_weekly(rows, &active, 3);

        assert_eq!(binned.len(), 1);
        assert_eq!(binned[0].date, date(2024, 3, 4));
        assert_eq!(binned[0].topic_count("a"), 7.0);
        assert_eq!(binned[0].topic_count("b"), 14.0);
        assert_eq!(binned[0].total, 21.0);
    }

    #[test]
    fn test_span_days() {
        let active = topics(&["a"]);
        let records = vec![
            record(date(2024, 1, 1), &[("a", 1.0)]),
            record(date(2024, 2, 1), &[("a", 1.0)]),
        ];
        let rows = build_rows(&records, &active);
        assert_eq!(span_days(&rows), 31);
        assert_eq!(span_days(&[]), 0);
    }

    #[test]
    fn test_records_from_json_skips_bad_entries() {
        let input = r#"[
            {"date": "2024-03-01", "healthcare": 5, "economy": 2},
            {"date": "not-a-date", "healthcare": 9},
            {"healthcare": 9},
            {"date": "2024-03-02", "healthcare": "lots", "economy": 4}
        ]"#;
        let records = records_from_json(input).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].counts["healthcare"], 5.0);
        // non-numeric count is dropped, leaving an implicit 0
        assert!(!records[1].counts.contains_key("healthcare"));
        assert_eq!(records[1].counts["economy"], 4.0);
    }

    #[test]
    fn test_records_from_json_rejects_non_array() {
        assert!(records_from_json("{\"date\": \"2024-03-01\"}").is_err());
        assert!(records_from_json("not json").is_err());
    }
}
