//! Core domain logic for video event marking.
//!
//! This crate contains the temporal event interval engine:
//! - Ordering, grouping and flattening of captured event instances
//! - Overlap detection, merge and split of instances of one event type
//! - The capture session that turns key presses into instances against a
//!   playback clock
//! - Setup validation and export rows

mod bucket;
pub mod capture;
pub mod clock;
pub mod export;
mod merge;
mod ordering;
mod overlap;
mod split;
pub mod types;
mod validate;

pub use bucket::Bucket;
pub use capture::{
    CaptureSession, IgnoreReason, InputEvent, InputSource, KeyOutcome, OpenRange,
    PLAY_PAUSE_KEY, Transition,
};
pub use clock::{ManualClock, PlaybackClock, PlaybackRate};
pub use export::{EXPORT_HEADER, ExportError, ExportRow, export_rows, format_elapsed, format_timestamp};
pub use merge::{merge, merge_events};
pub use ordering::{chronological, insert_in_order, sorted_insert, total_order};
pub use overlap::{overlapping, overlaps};
pub use split::{split, split_events};
pub use types::{
    AnalysisId, EventCategory, EventId, EventInstance, EventType, EventTypeDraft, EventTypeId,
    ValidationError, parse_keyboard_key,
};
pub use validate::{SetupError, validate_event_types};
