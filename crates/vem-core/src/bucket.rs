//! Per-type buckets and the flat chronological view.
//!
//! A [`Bucket`] keeps one ordered partition per event type. The flat view
//! produced by [`Bucket::flatten`] is always recomputed from the partitions
//! and is what display and export consumers receive.

use std::collections::BTreeMap;

use crate::ordering::{insert_in_order, total_order};
use crate::types::{EventId, EventInstance, EventTypeId};

/// Event instances grouped by event type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bucket {
    partitions: BTreeMap<EventTypeId, Vec<EventInstance>>,
}

impl Bucket {
    /// Creates an empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Partitions instances by event type, each partition sorted by start.
    ///
    /// The sort is stable, so instances sharing a start keep their input order.
    pub fn group_by_type(instances: impl IntoIterator<Item = EventInstance>) -> Self {
        let mut partitions: BTreeMap<EventTypeId, Vec<EventInstance>> = BTreeMap::new();
        for instance in instances {
            partitions
                .entry(instance.event_type_id)
                .or_default()
                .push(instance);
        }
        for events in partitions.values_mut() {
            events.sort_by(|a, b| a.start_timestamp.total_cmp(&b.start_timestamp));
        }
        Self { partitions }
    }

    /// Concatenates all partitions in the flat total order.
    pub fn flatten(&self) -> Vec<EventInstance> {
        let mut flat: Vec<EventInstance> = self.partitions.values().flatten().cloned().collect();
        flat.sort_by(total_order);
        flat
    }

    /// Returns the partition for one event type (empty if none).
    pub fn partition(&self, event_type_id: EventTypeId) -> &[EventInstance] {
        self.partitions
            .get(&event_type_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Iterates over non-empty partitions in event type order.
    pub fn partitions(&self) -> impl Iterator<Item = (EventTypeId, &[EventInstance])> {
        self.partitions
            .iter()
            .map(|(id, events)| (*id, events.as_slice()))
    }

    /// Total number of instances across all partitions.
    pub fn len(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Replaces the partition for one event type.
    pub fn replace_partition(&mut self, event_type_id: EventTypeId, events: Vec<EventInstance>) {
        if events.is_empty() {
            self.partitions.remove(&event_type_id);
        } else {
            self.partitions.insert(event_type_id, events);
        }
    }

    /// Inserts an instance in order, replacing any instance with the same id.
    pub fn upsert(&mut self, instance: EventInstance) {
        let event_type_id = instance.event_type_id;
        let remaining: Vec<EventInstance> = self
            .partition(event_type_id)
            .iter()
            .filter(|e| e.event_id != instance.event_id)
            .cloned()
            .collect();
        let updated = insert_in_order(&remaining, instance);
        self.replace_partition(event_type_id, updated);
    }

    /// Removes an instance, returning it if it was present.
    pub fn remove(
        &mut self,
        event_id: &EventId,
        event_type_id: EventTypeId,
    ) -> Option<EventInstance> {
        let events = self.partitions.get_mut(&event_type_id)?;
        let index = events.iter().position(|e| &e.event_id == event_id)?;
        let removed = events.remove(index);
        if events.is_empty() {
            self.partitions.remove(&event_type_id);
        }
        Some(removed)
    }
}

impl FromIterator<EventInstance> for Bucket {
    fn from_iter<I: IntoIterator<Item = EventInstance>>(iter: I) -> Self {
        Self::group_by_type(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventCategory;

    fn single(id: &str, type_id: i64, at: f64) -> EventInstance {
        EventInstance {
            event_id: EventId::new(id).unwrap(),
            event_type_id: EventTypeId(type_id),
            category: EventCategory::Single,
            start_timestamp: at,
            end_timestamp: None,
        }
    }

    fn ids(events: &[EventInstance]) -> Vec<&str> {
        events.iter().map(|e| e.event_id.as_str()).collect()
    }

    #[test]
    fn groups_by_event_type() {
        let bucket = Bucket::group_by_type(vec![
            single("1", 1, 0.0),
            single("2", 1, 5.0),
            single("3", 2, 10.0),
        ]);

        assert_eq!(ids(bucket.partition(EventTypeId(1))), vec!["1", "2"]);
        assert_eq!(ids(bucket.partition(EventTypeId(2))), vec!["3"]);
        assert!(bucket.partition(EventTypeId(3)).is_empty());
        assert_eq!(bucket.len(), 3);
    }

    #[test]
    fn empty_input_groups_to_empty_bucket() {
        let bucket = Bucket::group_by_type(Vec::new());
        assert!(bucket.is_empty());
        assert!(bucket.flatten().is_empty());
    }

    #[test]
    fn partitions_are_sorted_by_start() {
        let bucket = Bucket::group_by_type(vec![
            single("1", 1, 5.0),
            single("2", 1, 0.0),
            single("3", 2, 10.0),
        ]);
        assert_eq!(ids(bucket.partition(EventTypeId(1))), vec!["2", "1"]);
    }

    #[test]
    fn flatten_interleaves_types_chronologically() {
        let bucket = Bucket::group_by_type(vec![
            single("a", 2, 1.0),
            single("b", 1, 3.0),
            single("c", 2, 4.0),
            single("d", 1, 1.0),
        ]);
        assert_eq!(ids(&bucket.flatten()), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn upsert_replaces_by_id_and_keeps_order() {
        let mut bucket = Bucket::group_by_type(vec![single("a", 1, 1.0), single("b", 1, 4.0)]);
        bucket.upsert(single("a", 1, 6.0));
        assert_eq!(ids(bucket.partition(EventTypeId(1))), vec!["b", "a"]);
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut bucket = Bucket::group_by_type(vec![single("a", 1, 1.0)]);
        let missing = EventId::new("missing").unwrap();
        assert!(bucket.remove(&missing, EventTypeId(1)).is_none());
        assert!(bucket.remove(&missing, EventTypeId(9)).is_none());
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn removing_last_instance_drops_partition() {
        let mut bucket = Bucket::group_by_type(vec![single("a", 1, 1.0)]);
        let removed = bucket.remove(&EventId::new("a").unwrap(), EventTypeId(1));
        assert!(removed.is_some());
        assert!(bucket.is_empty());
        assert_eq!(bucket.partitions().count(), 0);
    }
}
