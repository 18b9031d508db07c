//! Flashpoint - engagement spike detection for legislative social-media data
//!
//! This library identifies statistically significant activity bursts
//! ("flashpoints") in time series of per-topic engagement counts, producing
//! ranked event intervals suitable for annotating a timeline chart.
//!
//! ## Module Structure
//!
//! - [`series`] - Row building, weekly binning, and lenient record loading
//! - [`stats`] - Robust statistics (median, MAD, local z-score profiles)
//! - [`detect`] - The detection pipeline and its public entry points
//!   - `peaks` - Per-topic local-maximum candidate search
//!   - `expand` - Boundary expansion, validation gates, enrichment
//!   - `control` - Cumulative/control-chart detection mode
//!   - `resolve` - Overlap resolution and final ranking

pub mod detect;
pub mod series;
pub mod stats;

pub use detect::{detect_events, DetectorConfig, DetectorMode, Event, EventDetector};
pub use series::{records_from_json, SeriesError, TimeSeriesRecord};
