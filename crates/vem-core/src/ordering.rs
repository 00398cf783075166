//! Ordering primitives shared by buckets and flat sequences.

use std::cmp::Ordering;

use crate::types::EventInstance;

/// Returns a copy of `items` with `value` inserted in ascending `key` order.
///
/// `items` must already be sorted by the same key. The new element goes
/// before the first item whose key is strictly greater, so it lands after
/// any items with an equal key. The input slice is left untouched.
pub fn sorted_insert<T, K, F>(items: &[T], value: T, key: F) -> Vec<T>
where
    T: Clone,
    K: PartialOrd,
    F: Fn(&T) -> K,
{
    let value_key = key(&value);
    let index = items
        .iter()
        .position(|item| key(item) > value_key)
        .unwrap_or(items.len());

    let mut out = Vec::with_capacity(items.len() + 1);
    out.extend_from_slice(&items[..index]);
    out.push(value);
    out.extend_from_slice(&items[index..]);
    out
}

/// Orders instances of one type by start, then by end (missing end as `0.0`).
pub fn chronological(a: &EventInstance, b: &EventInstance) -> Ordering {
    a.start_timestamp
        .total_cmp(&b.start_timestamp)
        .then_with(|| a.end_or_zero().total_cmp(&b.end_or_zero()))
}

/// Total order of the flat sequence: start, end (missing as `0.0`), type id.
pub fn total_order(a: &EventInstance, b: &EventInstance) -> Ordering {
    chronological(a, b).then_with(|| a.event_type_id.cmp(&b.event_type_id))
}

/// Inserts an instance into a chronologically ordered partition.
pub fn insert_in_order(events: &[EventInstance], event: EventInstance) -> Vec<EventInstance> {
    sorted_insert(events, event, |e| (e.start_timestamp, e.end_or_zero()))
}
