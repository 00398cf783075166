//! Collapsing overlapping instances into their minimal covering set.
//!
//! Each partition is handled on its own:
//! - point partitions drop later repeats of an already seen start
//! - range partitions fold into one instance spanning the earliest start to
//!   the latest end, keeping the first instance's id
//!
//! An open range in the partition keeps the merged result open.

use std::collections::HashSet;

use crate::bucket::Bucket;
use crate::overlap::instant_key;
use crate::types::{EventCategory, EventInstance};

/// Merges every partition of `bucket`.
pub fn merge(bucket: &Bucket) -> Bucket {
    let mut merged = Bucket::new();
    for (event_type_id, events) in bucket.partitions() {
        merged.replace_partition(event_type_id, merge_partition(events));
    }
    merged
}

/// Groups, merges and re-flattens a flat sequence.
pub fn merge_events(events: &[EventInstance]) -> Vec<EventInstance> {
    merge(&Bucket::group_by_type(events.iter().cloned())).flatten()
}

fn merge_partition(events: &[EventInstance]) -> Vec<EventInstance> {
    if events.len() <= 1 {
        return events.to_vec();
    }
    match events[0].category {
        EventCategory::Single => dedup_points(events),
        EventCategory::Range => vec![covering_range(events)],
    }
}

/// Keeps the first occurrence of each distinct start, preserving order.
pub(crate) fn dedup_points(events: &[EventInstance]) -> Vec<EventInstance> {
    let mut seen = HashSet::new();
    events
        .iter()
        .filter(|e| seen.insert(instant_key(e.start_timestamp)))
        .cloned()
        .collect()
}

fn covering_range(events: &[EventInstance]) -> EventInstance {
    let first = &events[0];
    let start = events
        .iter()
        .map(|e| e.start_timestamp)
        .fold(f64::INFINITY, f64::min);
    let end = if events.iter().any(|e| e.end_timestamp.is_none()) {
        None
    } else {
        events
            .iter()
            .filter_map(|e| e.end_timestamp)
            .reduce(f64::max)
    };

    debug_assert!(
        end.is_none_or(|end| end >= start),
        "merge produced a negative-length interval: {start}..{end:?}"
    );

    EventInstance {
        event_id: first.event_id.clone(),
        event_type_id: first.event_type_id,
        category: first.category,
        start_timestamp: start,
        end_timestamp: end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, EventTypeId};

    fn range(id: &str, start: f64, end: Option<f64>) -> EventInstance {
        EventInstance {
            event_id: EventId::new(id).unwrap(),
            event_type_id: EventTypeId(1),
            category: EventCategory::Range,
            start_timestamp: start,
            end_timestamp: end,
        }
    }

    fn single(id: &str, at: f64) -> EventInstance {
        EventInstance {
            event_id: EventId::new(id).unwrap(),
            event_type_id: EventTypeId(2),
            category: EventCategory::Single,
            start_timestamp: at,
            end_timestamp: None,
        }
    }

    #[test]
    fn overlapping_ranges_collapse_to_cover() {
        let events = vec![
            range("a", 0.0, Some(5.0)),
            range("b", 6.0, Some(9.0)),
            range("c", 3.0, Some(20.0)),
            range("d", 8.0, Some(12.0)),
            range("e", 15.0, Some(22.0)),
        ];

        let merged = merge_events(&events);

        assert_eq!(merged, vec![range("a", 0.0, Some(22.0))]);
    }

    #[test]
    fn merged_id_comes_from_earliest_start() {
        let events = vec![range("late", 4.0, Some(9.0)), range("early", 1.0, Some(5.0))];
        let merged = merge_events(&events);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].event_id.as_str(), "early");
        assert_eq!(merged[0].start_timestamp, 1.0);
        assert_eq!(merged[0].end_timestamp, Some(9.0));
    }

    #[test]
    fn open_member_keeps_result_open() {
        let events = vec![range("a", 0.0, Some(5.0)), range("b", 3.0, None)];
        let merged = merge_events(&events);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].end_timestamp.is_none());
    }

    #[test]
    fn duplicate_points_keep_first_seen() {
        let events = vec![single("first", 10.0), single("second", 10.0), single("other", 12.0)];
        let merged = merge_events(&events);
        let ids: Vec<_> = merged.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "other"]);
    }

    #[test]
    fn single_member_partitions_are_untouched() {
        let events = vec![range("a", 1.0, None), single("b", 3.0)];
        let merged = merge_events(&events);
        assert_eq!(merged, events);
    }

    #[test]
    fn types_merge_independently() {
        let mut other = range("other", 2.0, Some(4.0));
        other.event_type_id = EventTypeId(9);
        let events = vec![range("a", 0.0, Some(3.0)), range("b", 1.0, Some(6.0)), other];

        let merged = merge_events(&events);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].end_timestamp, Some(6.0));
        assert_eq!(merged[1].event_id.as_str(), "other");
    }

    #[test]
    fn merge_is_idempotent_on_bucket() {
        let bucket = Bucket::group_by_type(vec![
            range("a", 0.0, Some(3.0)),
            range("b", 2.0, Some(6.0)),
            single("c", 1.0),
            single("d", 1.0),
        ]);
        let once = merge(&bucket);
        assert_eq!(merge(&once), once);
    }

    #[test]
    fn signed_zero_points_are_duplicates() {
        let merged = merge_events(&[single("neg", -0.0), single("pos", 0.0)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].event_id.as_str(), "neg");
    }
}
