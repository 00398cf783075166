//! Decomposing overlapping ranges into disjoint back-to-back pieces.
//!
//! The inverse of [`crate::merge`] for range partitions: every start and end
//! in the partition becomes a boundary, and each pair of consecutive
//! distinct boundaries becomes a piece. Gaps between disconnected ranges
//! are emitted as pieces too; an open range contributes only its start.
//! Pieces reuse the input ids in emission order; extra pieces get fresh
//! ids. Point partitions are deduplicated exactly like a merge.

use std::iter;

use crate::bucket::Bucket;
use crate::merge::dedup_points;
use crate::types::{EventCategory, EventId, EventInstance};

/// Splits every partition of `bucket`.
pub fn split(bucket: &Bucket) -> Bucket {
    let mut pieces = Bucket::new();
    for (event_type_id, events) in bucket.partitions() {
        pieces.replace_partition(event_type_id, split_partition(events));
    }
    pieces
}

/// Groups, splits and re-flattens a flat sequence.
pub fn split_events(events: &[EventInstance]) -> Vec<EventInstance> {
    split(&Bucket::group_by_type(events.iter().cloned())).flatten()
}

fn split_partition(events: &[EventInstance]) -> Vec<EventInstance> {
    if events.len() <= 1 {
        return events.to_vec();
    }
    if events[0].category == EventCategory::Single {
        return dedup_points(events);
    }

    let mut boundaries: Vec<f64> = events
        .iter()
        .flat_map(|e| iter::once(e.start_timestamp).chain(e.end_timestamp))
        .collect();
    boundaries.sort_by(f64::total_cmp);
    boundaries.dedup_by(|a, b| a.total_cmp(b).is_eq());

    let template = &events[0];
    let mut ids = events.iter().map(|e| e.event_id.clone());

    boundaries
        .windows(2)
        .filter(|pair| pair[0] < pair[1])
        .map(|pair| EventInstance {
            event_id: ids.next().unwrap_or_else(EventId::generate),
            event_type_id: template.event_type_id,
            category: template.category,
            start_timestamp: pair[0],
            end_timestamp: Some(pair[1]),
        })
        .collect()
}
