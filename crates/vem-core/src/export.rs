//! Export rows and time formatting.

use std::collections::HashMap;

use thiserror::Error;

use crate::ordering::total_order;
use crate::types::{EventInstance, EventType, EventTypeId};

/// Errors building export rows.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExportError {
    #[error("event type {0} not found")]
    UnknownEventType(EventTypeId),
}

/// One exported annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub event_type_name: String,
    pub start_timestamp: f64,
    pub end_timestamp: Option<f64>,
}

impl ExportRow {
    /// The textual fields of the row: name, start, end (empty for points).
    pub fn record(&self) -> [String; 3] {
        [
            self.event_type_name.clone(),
            format_timestamp(self.start_timestamp),
            self.end_timestamp.map(format_timestamp).unwrap_or_default(),
        ]
    }
}

/// Column headers matching [`ExportRow::record`].
pub const EXPORT_HEADER: [&str; 3] = ["Event Type", "Start Time", "End Time"];

/// Builds export rows in flat chronological order.
pub fn export_rows(
    events: &[EventInstance],
    event_types: &[EventType],
) -> Result<Vec<ExportRow>, ExportError> {
    let names: HashMap<EventTypeId, &str> = event_types
        .iter()
        .map(|t| (t.id, t.name.as_str()))
        .collect();

    let mut ordered: Vec<&EventInstance> = events.iter().collect();
    ordered.sort_by(|a, b| total_order(a, b));

    ordered
        .into_iter()
        .map(|event| {
            let name = names
                .get(&event.event_type_id)
                .ok_or(ExportError::UnknownEventType(event.event_type_id))?;
            Ok(ExportRow {
                event_type_name: (*name).to_string(),
                start_timestamp: event.start_timestamp,
                end_timestamp: event.end_timestamp,
            })
        })
        .collect()
}

/// Seconds with two decimals, e.g. `7.50`.
pub fn format_timestamp(seconds: f64) -> String {
    format!("{seconds:.2}")
}

/// Elapsed time for live display, e.g. `4.5s` or `1m 5.0s`.
pub fn format_elapsed(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor();
    let remaining = seconds - minutes * 60.0;
    if minutes < 1.0 {
        return format!("{remaining:.1}s");
    }
    format!("{minutes:.0}m {remaining:.1}s")
}
