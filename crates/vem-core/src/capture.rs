//! Live capture of event instances against a playback clock.
//!
//! # State per event type
//!
//! ```text
//! Single:  every press  -> new point (exact repeats are dropped)
//! Range:   Idle  --press--> Open   (start = clock time)
//!          Open  --press--> Idle   (end = clock time, merged with overlaps)
//! ```
//!
//! Presses are only honoured while the clock is playing. The space key is
//! reserved for play/pause. Clock ticks refresh the playhead used for the
//! in-progress display and never touch the bucket.

use std::collections::VecDeque;

use crate::bucket::Bucket;
use crate::clock::PlaybackClock;
use crate::merge::merge_events;
use crate::ordering::insert_in_order;
use crate::overlap::overlapping;
use crate::types::{EventCategory, EventId, EventInstance, EventType, EventTypeId};

/// Key that toggles playback; never bindable to an event type.
pub const PLAY_PAUSE_KEY: char = ' ';

/// Input delivered to a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyDown(char),
    /// Periodic clock progress notification.
    Tick,
}

/// A source of input events for the lifetime of a session.
pub trait InputSource {
    /// Returns the next event, or `None` once the source is exhausted.
    fn poll(&mut self) -> Option<InputEvent>;
}

impl InputSource for VecDeque<InputEvent> {
    fn poll(&mut self) -> Option<InputEvent> {
        self.pop_front()
    }
}

/// Why a press did not change anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No event type is bound to the key.
    UnboundKey,
    /// The event type id is not part of this session.
    UnknownEventType,
    /// Captures are suppressed while paused.
    Paused,
    /// The open range starts at or after the current time.
    BeforeOpenStart,
}

/// A change applied to the bucket by one press.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Point {
        event_id: EventId,
        at: f64,
    },
    /// A point at an instant that was already marked.
    Duplicate {
        at: f64,
    },
    Opened {
        event_id: EventId,
        at: f64,
    },
    Closed {
        event_id: EventId,
        start: f64,
        end: f64,
    },
    /// The closed range overlapped others and was folded together with them.
    Merged {
        event_id: EventId,
        start: f64,
        end: Option<f64>,
        absorbed: Vec<EventId>,
    },
}

/// Result of handling one key press.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Ignored(IgnoreReason),
    PlaybackToggled { playing: bool },
    Recorded(Transition),
}

/// A range that is still being captured.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRange {
    pub event_id: EventId,
    pub event_type_id: EventTypeId,
    pub start_timestamp: f64,
    /// Playhead minus start, as of the last tick.
    pub elapsed: f64,
}

/// A capture session for one analysis.
///
/// Owns the bucket exclusively; consumers get flattened snapshots.
#[derive(Debug)]
pub struct CaptureSession<C> {
    clock: C,
    event_types: Vec<EventType>,
    bucket: Bucket,
    playhead: f64,
}

impl<C: PlaybackClock> CaptureSession<C> {
    /// Starts an empty session.
    pub fn new(event_types: Vec<EventType>, clock: C) -> Self {
        Self::resume(event_types, clock, Vec::new())
    }

    /// Starts a session on top of previously captured instances.
    pub fn resume(event_types: Vec<EventType>, clock: C, events: Vec<EventInstance>) -> Self {
        let playhead = clock.current_time();
        tracing::info!(
            event_types = event_types.len(),
            events = events.len(),
            "capture session started"
        );
        Self {
            clock,
            event_types,
            bucket: Bucket::group_by_type(events),
            playhead,
        }
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn event_types(&self) -> &[EventType] {
        &self.event_types
    }

    pub const fn bucket(&self) -> &Bucket {
        &self.bucket
    }

    /// Flat, totally ordered copy of everything captured so far.
    pub fn snapshot(&self) -> Vec<EventInstance> {
        self.bucket.flatten()
    }

    /// Playhead as of the last tick.
    pub const fn playhead(&self) -> f64 {
        self.playhead
    }

    /// Consumes `source` until it is exhausted, returning key outcomes.
    pub fn drive<S: InputSource + ?Sized>(&mut self, source: &mut S) -> Vec<KeyOutcome> {
        let mut outcomes = Vec::new();
        while let Some(event) = source.poll() {
            if let Some(outcome) = self.dispatch(event) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Handles one input event. Ticks produce no outcome.
    pub fn dispatch(&mut self, event: InputEvent) -> Option<KeyOutcome> {
        match event {
            InputEvent::KeyDown(key) => Some(self.handle_key(key)),
            InputEvent::Tick => {
                self.on_tick();
                None
            }
        }
    }

    /// Handles a key-down.
    pub fn handle_key(&mut self, key: char) -> KeyOutcome {
        if key == PLAY_PAUSE_KEY {
            self.clock.toggle();
            let playing = self.clock.is_playing();
            tracing::debug!(playing, "playback toggled");
            return KeyOutcome::PlaybackToggled { playing };
        }

        let Some(event_type_id) = self
            .event_types
            .iter()
            .find(|t| t.keyboard_key == key)
            .map(|t| t.id)
        else {
            tracing::debug!(?key, "ignoring unbound key");
            return KeyOutcome::Ignored(IgnoreReason::UnboundKey);
        };

        self.add_event(event_type_id)
    }

    /// Records a press for `event_type_id` at the current clock time.
    pub fn add_event(&mut self, event_type_id: EventTypeId) -> KeyOutcome {
        let Some(event_type) = self
            .event_types
            .iter()
            .find(|t| t.id == event_type_id)
            .cloned()
        else {
            return KeyOutcome::Ignored(IgnoreReason::UnknownEventType);
        };

        if !self.clock.is_playing() {
            tracing::debug!(%event_type_id, "ignoring press while paused");
            return KeyOutcome::Ignored(IgnoreReason::Paused);
        }

        let now = self.clock.current_time();
        match event_type.category {
            EventCategory::Single => self.record_point(&event_type, now),
            EventCategory::Range => self.toggle_range(&event_type, now),
        }
    }

    /// Deletes an instance. Unknown ids are a no-op.
    pub fn remove_event(&mut self, event_id: &EventId, event_type_id: EventTypeId) -> bool {
        let removed = self.bucket.remove(event_id, event_type_id).is_some();
        if !removed {
            tracing::debug!(%event_id, %event_type_id, "nothing to remove");
        }
        removed
    }

    /// Refreshes the playhead from the clock.
    pub fn on_tick(&mut self) {
        self.playhead = self.clock.current_time();
    }

    /// Ranges still open, with time elapsed since their start.
    pub fn in_progress(&self) -> Vec<OpenRange> {
        self.bucket
            .partitions()
            .flat_map(|(_, events)| events.iter())
            .filter(|e| e.is_open())
            .map(|e| OpenRange {
                event_id: e.event_id.clone(),
                event_type_id: e.event_type_id,
                start_timestamp: e.start_timestamp,
                elapsed: self.playhead - e.start_timestamp,
            })
            .collect()
    }

    /// Ends the session, returning the finished instances in flat order.
    ///
    /// Open ranges are dropped, not closed.
    pub fn finish(self) -> Vec<EventInstance> {
        let (open, finished): (Vec<_>, Vec<_>) =
            self.bucket.flatten().into_iter().partition(EventInstance::is_open);
        if !open.is_empty() {
            tracing::info!(discarded = open.len(), "dropping unfinished ranges");
        }
        tracing::info!(events = finished.len(), "capture session finished");
        finished
    }

    fn record_point(&mut self, event_type: &EventType, now: f64) -> KeyOutcome {
        let instance = EventInstance::point(event_type, now);
        let event_id = instance.event_id.clone();

        let inserted = insert_in_order(self.bucket.partition(event_type.id), instance);
        let deduped = merge_events(&inserted);
        let duplicate = deduped.len() < inserted.len();
        self.bucket.replace_partition(event_type.id, deduped);

        if duplicate {
            tracing::debug!(event_type = %event_type.name, at = now, "duplicate point dropped");
            KeyOutcome::Recorded(Transition::Duplicate { at: now })
        } else {
            tracing::debug!(event_type = %event_type.name, at = now, "point recorded");
            KeyOutcome::Recorded(Transition::Point { event_id, at: now })
        }
    }

    fn toggle_range(&mut self, event_type: &EventType, now: f64) -> KeyOutcome {
        let partition = self.bucket.partition(event_type.id);
        let Some(open) = partition.iter().find(|e| e.is_open()).cloned() else {
            let instance = EventInstance::open_range(event_type, now);
            let event_id = instance.event_id.clone();
            self.bucket.upsert(instance);
            tracing::debug!(event_type = %event_type.name, at = now, "range opened");
            return KeyOutcome::Recorded(Transition::Opened { event_id, at: now });
        };

        if open.start_timestamp >= now {
            tracing::debug!(
                event_type = %event_type.name,
                start = open.start_timestamp,
                now,
                "clock is not past the open range start"
            );
            return KeyOutcome::Ignored(IgnoreReason::BeforeOpenStart);
        }

        let closed = EventInstance {
            end_timestamp: Some(now),
            ..open
        };

        let rest: Vec<EventInstance> = partition
            .iter()
            .filter(|e| e.event_id != closed.event_id)
            .cloned()
            .collect();
        let overlaps: Vec<EventInstance> = overlapping(&closed, &rest).into_iter().cloned().collect();

        if overlaps.is_empty() {
            let event_id = closed.event_id.clone();
            let start = closed.start_timestamp;
            self.bucket.upsert(closed);
            tracing::debug!(event_type = %event_type.name, start, end = now, "range closed");
            return KeyOutcome::Recorded(Transition::Closed {
                event_id,
                start,
                end: now,
            });
        }

        let mut group = overlaps;
        group.push(closed);
        let merged = merge_events(&group);

        let mut absorbed = Vec::new();
        for superseded in group
            .iter()
            .filter(|e| !merged.iter().any(|m| m.event_id == e.event_id))
        {
            self.bucket.remove(&superseded.event_id, event_type.id);
            absorbed.push(superseded.event_id.clone());
        }
        for instance in &merged {
            self.bucket.upsert(instance.clone());
        }

        let survivor = &merged[0];
        tracing::debug!(
            event_type = %event_type.name,
            start = survivor.start_timestamp,
            end = ?survivor.end_timestamp,
            absorbed = absorbed.len(),
            "range merged with overlaps"
        );
        KeyOutcome::Recorded(Transition::Merged {
            event_id: survivor.event_id.clone(),
            start: survivor.start_timestamp,
            end: survivor.end_timestamp,
            absorbed,
        })
    }
}
