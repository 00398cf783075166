//! Overlap detection between a candidate instance and a partition.
//!
//! Point events only collide when they carry the exact same start. Ranges
//! use an inclusive containment test, so intervals that merely touch count
//! as overlapping. A missing end is treated as an ongoing, unbounded range.
//! Instances of different event types never overlap.

use crate::types::{EventCategory, EventInstance};

/// Returns the members of `existing` that overlap `candidate`.
pub fn overlapping<'a>(
    candidate: &EventInstance,
    existing: &'a [EventInstance],
) -> Vec<&'a EventInstance> {
    existing
        .iter()
        .filter(|event| overlaps(candidate, event))
        .collect()
}

/// Pairwise form of [`overlapping`].
pub fn overlaps(candidate: &EventInstance, event: &EventInstance) -> bool {
    if candidate.event_type_id != event.event_type_id {
        return false;
    }

    match candidate.category {
        EventCategory::Single => same_instant(candidate.start_timestamp, event.start_timestamp),
        EventCategory::Range => {
            let (start, end) = span(candidate);
            let (other_start, other_end) = span(event);

            let candidate_contains_start = start <= other_start && other_start <= end;
            let event_contains_start = other_start <= start && start <= other_end;
            let event_contains_end = other_start <= end && end <= other_end;

            candidate_contains_start || event_contains_start || event_contains_end
        }
    }
}

fn span(event: &EventInstance) -> (f64, f64) {
    (
        event.start_timestamp,
        event.end_timestamp.unwrap_or(f64::INFINITY),
    )
}

/// Hashable identity of a point in time; `-0.0` and `0.0` are the same
/// instant.
pub(crate) const fn instant_key(at: f64) -> u64 {
    (at + 0.0).to_bits()
}

const fn same_instant(a: f64, b: f64) -> bool {
    instant_key(a) == instant_key(b)
}
