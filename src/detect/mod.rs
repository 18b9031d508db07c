//! Event (flashpoint) detection for engagement time series.
//!
//! Identifies statistically significant activity bursts in a multi-topic
//! engagement series and returns ranked event intervals for chart annotation.
//! The pipeline runs entirely in memory with no shared state; identical
//! inputs always produce identical output.
//!
//! ## Pipeline
//!
//! 1. Build per-date rows restricted to the active topics ([`crate::series`])
//! 2. Re-bin to ISO weeks when the series is long, then bail out on
//!    too-few rows or a sub-monthly span
//! 3. Find per-topic peak candidates ([`peaks`])
//! 4. Expand each candidate into an event window on the aggregate series
//!    and validate duration/prominence ([`expand`]) — or, in cumulative
//!    mode, derive windows from a CUSUM-style control chart ([`control`])
//! 5. Resolve overlaps and keep the strongest events ([`resolve`])

pub mod control;
pub mod expand;
pub mod peaks;
pub mod resolve;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::series::{self, TimeSeriesRecord};
use crate::stats;

// ============================================================================
// Detector Mode
// ============================================================================

/// Which detection algorithm to run
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    /// Peak expansion while the local robust z-score stays above 1
    #[default]
    Robust,
    /// Like robust, but expands while z stays above 0.5 (wider windows)
    Sensitive,
    /// Control-chart detector: trailing z, EMA de-biasing, CUSUM
    /// accumulation with hysteresis open/close thresholds
    Cumulative,
}

// ============================================================================
// Configuration
// ============================================================================

/// Tunable thresholds for event detection.
///
/// The defaults are the canonical constant set; every threshold the
/// algorithm consults lives here rather than inline at the use site.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Re-bin rows into ISO weeks when the series has more rows than this
    pub weekly_bin_threshold: usize,
    /// Minimum rows (after binning) for detection to be meaningful
    pub min_rows: usize,
    /// Minimum calendar span in days; shorter ranges return no events
    pub min_span_days: i64,
    /// Symmetric z-score window width for series longer than the binning
    /// threshold (tighter baseline on long/binned series)
    pub long_series_window: usize,
    /// Symmetric z-score window width for shorter series
    pub short_series_window: usize,
    /// A peak must exceed this fraction of the topic's global maximum
    pub peak_height_fraction: f64,
    /// At most this many pooled peak candidates are expanded
    pub max_peak_candidates: usize,
    /// Expansion continues while z exceeds this threshold (robust mode)
    pub robust_expand_z: f64,
    /// Expansion threshold for the sensitive mode
    pub sensitive_expand_z: f64,
    /// Events shorter than this many days are never reported
    pub min_event_duration_days: i64,
    /// Peak prominence must reach this fraction of the local sigma
    /// (skipped when the local sigma is 0)
    pub prominence_sigma_factor: f64,
    /// Maximum number of events returned
    pub max_events: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            weekly_bin_threshold: 400,
            min_rows: 10,
            min_span_days: 30,
            long_series_window: 8,
            short_series_window: 21,
            peak_height_fraction: 0.1,
            max_peak_candidates: 10,
            robust_expand_z: 1.0,
            sensitive_expand_z: 0.5,
            min_event_duration_days: 2,
            prominence_sigma_factor: 0.5,
            max_events: 3,
        }
    }
}

impl DetectorConfig {
    /// Z-score window width for a series of `n_rows` rows
    pub fn window_for(&self, n_rows: usize) -> usize {
        if n_rows > self.weekly_bin_threshold {
            self.long_series_window
        } else {
            self.short_series_window
        }
    }

    /// Expansion threshold for a peak-expansion mode
    fn expand_threshold(&self, mode: DetectorMode) -> f64 {
        match mode {
            DetectorMode::Sensitive => self.sensitive_expand_z,
            _ => self.robust_expand_z,
        }
    }
}

// ============================================================================
// Output Type
// ============================================================================

/// A detected engagement event.
///
/// Indices point into the (possibly weekly-binned) row array the detector
/// worked on; the date fields are what chart overlays consume. `z_peak` and
/// `peak_z` carry the same value, kept as duplicate fields for consumers of
/// the original output shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// First row index of the event window
    pub start_idx: usize,
    /// Last row index of the event window (inclusive)
    pub end_idx: usize,
    /// Row index of the candidate peak
    pub peak_idx: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub peak_date: NaiveDate,
    /// Aggregate total at `peak_idx`
    pub peak_value: f64,
    /// Topic whose series produced this event's candidate peak
    pub associated_topic: String,
    /// Where that topic's own maximum falls inside the window
    pub topic_peak_idx: usize,
    pub topic_peak_date: NaiveDate,
    /// Where the aggregate total is maximal inside the window
    pub max_idx: usize,
    pub max_date: NaiveDate,
    /// Local median at the peak
    pub baseline: f64,
    /// Robust z-score at the peak
    pub z_peak: f64,
    /// Duplicate of `z_peak`, kept for output compatibility
    pub peak_z: f64,
    /// Peak value minus the higher of the two flanking valleys
    pub prominence: f64,
    /// Sum of the aggregate totals over the window
    pub total_engagement: f64,
}

impl Event {
    /// Event duration in calendar days
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Whether this event's date interval intersects another's (inclusive)
    pub fn overlaps(&self, other: &Event) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Event detector with explicit configuration
pub struct EventDetector {
    config: DetectorConfig,
}

impl Default for EventDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl EventDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run detection over raw records for the given topics.
    ///
    /// Returns 0 to `max_events` events, strongest first. All failure paths
    /// are empty returns; this never panics on odd input.
    pub fn detect(
        &self,
        records: &[TimeSeriesRecord],
        active_topics: &[String],
        mode: DetectorMode,
    ) -> Vec<Event> {
        if records.is_empty() || active_topics.is_empty() {
            return Vec::new();
        }

        let rows = series::build_rows(records, active_topics);
        let rows = series::maybe_bin_weekly(rows, active_topics, self.config.weekly_bin_threshold);

        if rows.len() < self.config.min_rows {
            tracing::debug!("Too few rows for detection: {}", rows.len());
            return Vec::new();
        }
        if series::span_days(&rows) < self.config.min_span_days {
            tracing::debug!(
                "Date span under {} days, skipping detection",
                self.config.min_span_days
            );
            return Vec::new();
        }

        let totals: Vec<f64> = rows.iter().map(|r| r.total).collect();
        let win = self.config.window_for(rows.len());
        let profile = stats::local_robust_z(&totals, win);

        let candidates = match mode {
            DetectorMode::Robust | DetectorMode::Sensitive => {
                let peaks = peaks::find_candidates(&rows, active_topics, &self.config);
                let threshold = self.config.expand_threshold(mode);
                peaks
                    .into_iter()
                    .map(|peak| {
                        let (start_idx, end_idx) =
                            expand::expand_window(&profile.z, peak.idx, threshold);
                        expand::WindowCandidate {
                            start_idx,
                            end_idx,
                            peak_idx: peak.idx,
                            topic: Some(peak.topic),
                        }
                    })
                    .collect()
            }
            DetectorMode::Cumulative => {
                control::detect_intervals(&totals, rows.len() > self.config.weekly_bin_threshold)
                    .into_iter()
                    .map(|interval| expand::WindowCandidate {
                        start_idx: interval.start_idx,
                        end_idx: interval.end_idx,
                        peak_idx: interval.peak_idx,
                        topic: None,
                    })
                    .collect::<Vec<_>>()
            }
        };

        let events: Vec<Event> = candidates
            .into_iter()
            .filter_map(|candidate| {
                expand::validate_and_enrich(
                    &rows,
                    &totals,
                    &profile,
                    win,
                    candidate,
                    active_topics,
                    &self.config,
                )
            })
            .collect();

        let selected = resolve::select_top(events, self.config.max_events);
        tracing::debug!(
            "Detected {} event(s) over {} rows ({} mode)",
            selected.len(),
            rows.len(),
            mode
        );
        selected
    }
}

/// Detect engagement events with the default configuration.
///
/// This is the primary entry point: `records` are per-date topic counts,
/// `active_topics` selects which topic fields are analyzed, and the result
/// is 0–3 non-overlapping events ordered by descending peak strength.
pub fn detect_events(
    records: &[TimeSeriesRecord],
    active_topics: &[String],
    mode: DetectorMode,
) -> Vec<Event> {
    EventDetector::default().detect(records, active_topics, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trips_through_strings() {
        use std::str::FromStr;
        assert_eq!(DetectorMode::from_str("robust").unwrap(), DetectorMode::Robust);
        assert_eq!(
            DetectorMode::from_str("Cumulative").unwrap(),
            DetectorMode::Cumulative
        );
        assert_eq!(DetectorMode::Sensitive.to_string(), "sensitive");
        assert!(DetectorMode::from_str("nonsense").is_err());
    }

    #[test]
    fn test_window_size_depends_on_row_count() {
        let config = DetectorConfig::default();
        assert_eq!(config.window_for(100), 21);
        assert_eq!(config.window_for(400), 21);
        assert_eq!(config.window_for(401), 8);
    }

    #[test]
    fn test_default_config_is_canonical_set() {
        let config = DetectorConfig::default();
        assert_eq!(config.weekly_bin_threshold, 400);
        assert_eq!(config.min_rows, 10);
        assert_eq!(config.min_span_days, 30);
        assert_eq!(config.max_peak_candidates, 10);
        assert_eq!(config.max_events, 3);
        assert_eq!(config.min_event_duration_days, 2);
    }
}
