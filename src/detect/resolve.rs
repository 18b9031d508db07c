//! Overlap resolution and final event selection.
//!
//! Multiple topics often spike around the same real-world incident; without
//! deduplication the same news event would appear two or three times in the
//! result and crowd out genuinely distinct events.

use super::Event;

/// Keep the strongest non-overlapping events, at most `max_events`.
///
/// Events are ordered by `peak_value` descending (ties broken by earlier
/// start date, then lower peak index, for reproducible output) and accepted
/// greedily when their inclusive date interval does not intersect any
/// already-accepted event — the stronger event wins a collision.
pub fn select_top(mut events: Vec<Event>, max_events: usize) -> Vec<Event> {
    events.sort_by(|a, b| {
        b.peak_value
            .partial_cmp(&a.peak_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.start_date.cmp(&b.start_date))
            .then_with(|| a.peak_idx.cmp(&b.peak_idx))
    });

    let mut accepted: Vec<Event> = Vec::new();
    for event in events {
        if accepted.len() >= max_events {
            break;
        }
        if !accepted.iter().any(|kept| kept.overlaps(&event)) {
            accepted.push(event);
        }
    }
    accepted
}
