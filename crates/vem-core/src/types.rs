//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// Invalid event category value.
    #[error("invalid event category: {value}")]
    InvalidCategory { value: String },

    /// A keyboard key must be exactly one character.
    #[error("keyboard key must be a single character, got {value:?}")]
    InvalidKeyboardKey { value: String },
}

/// Shape of an event type: an instant or a toggled interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// An instantaneous mark with only a start instant.
    Single,
    /// An interval opened and closed by repeated key presses.
    Range,
}

impl EventCategory {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Range => "range",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "range" => Ok(Self::Range),
            _ => Err(ValidationError::InvalidCategory {
                value: s.to_string(),
            }),
        }
    }
}

/// Generates an integer key newtype backed by a database row id.
macro_rules! define_row_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns the raw row id.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_row_id!(
    /// Key of an analysis (one video plus its event types).
    AnalysisId
);

define_row_id!(
    /// Key of an event type, unique within an analysis.
    EventTypeId
);

/// A validated event instance identifier.
///
/// Event IDs must be non-empty strings. Freshly captured instances get a
/// UUID v4; stored instances keep whatever id they were saved with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    /// Creates a new ID after validation.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::Empty { field: "event ID" });
        }
        Ok(Self(id))
    }

    /// Mints a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EventId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parses a keyboard key binding, which must be exactly one character.
pub fn parse_keyboard_key(value: &str) -> Result<char, ValidationError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(key), None) => Ok(key),
        _ => Err(ValidationError::InvalidKeyboardKey {
            value: value.to_string(),
        }),
    }
}

/// A user-defined annotation kind bound to a trigger key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventType {
    pub id: EventTypeId,
    pub analysis_id: AnalysisId,
    pub name: String,
    pub keyboard_key: char,
    pub category: EventCategory,
}

/// An event type as entered in the setup form, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTypeDraft {
    pub name: String,
    pub keyboard_key: char,
    pub category: EventCategory,
}

impl EventTypeDraft {
    pub fn new(name: impl Into<String>, keyboard_key: char, category: EventCategory) -> Self {
        Self {
            name: name.into(),
            keyboard_key,
            category,
        }
    }
}

/// A concrete annotation captured against the playback clock.
///
/// Timestamps are seconds of media time. `end_timestamp` is only ever set
/// on closed [`EventCategory::Range`] instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInstance {
    pub event_id: EventId,
    pub event_type_id: EventTypeId,
    pub category: EventCategory,
    pub start_timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<f64>,
}

impl EventInstance {
    /// A point of a Single event type at `at`.
    pub fn point(event_type: &EventType, at: f64) -> Self {
        debug_assert_eq!(event_type.category, EventCategory::Single);
        Self::begin(event_type, at)
    }

    /// An open range of a Range event type starting at `at`.
    pub fn open_range(event_type: &EventType, at: f64) -> Self {
        debug_assert_eq!(event_type.category, EventCategory::Range);
        Self::begin(event_type, at)
    }

    /// Creates a new instance of `event_type` starting at `at`.
    ///
    /// Range instances start out open.
    pub fn begin(event_type: &EventType, at: f64) -> Self {
        Self {
            event_id: EventId::generate(),
            event_type_id: event_type.id,
            category: event_type.category,
            start_timestamp: at,
            end_timestamp: None,
        }
    }

    /// Returns true for a range whose end has not been recorded yet.
    pub const fn is_open(&self) -> bool {
        matches!(self.category, EventCategory::Range) && self.end_timestamp.is_none()
    }

    /// The end used for ordering: a missing end compares as `0.0`.
    pub fn end_or_zero(&self) -> f64 {
        self.end_timestamp.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_type(category: EventCategory) -> EventType {
        EventType {
            id: EventTypeId(7),
            analysis_id: AnalysisId(1),
            name: "Goal".to_string(),
            keyboard_key: 'g',
            category,
        }
    }

    #[test]
    fn event_id_rejects_empty() {
        assert!(EventId::new("").is_err());
        assert!(EventId::new("valid-id").is_ok());
    }

    #[test]
    fn event_id_serde_rejects_empty() {
        let result: Result<EventId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(EventId::generate(), EventId::generate());
    }

    #[test]
    fn category_from_str() {
        assert_eq!(
            "single".parse::<EventCategory>().unwrap(),
            EventCategory::Single
        );
        assert_eq!(
            "range".parse::<EventCategory>().unwrap(),
            EventCategory::Range
        );
        assert!("Range".parse::<EventCategory>().is_err());
    }

    #[test]
    fn category_serializes_lowercase() {
        let json = serde_json::to_string(&EventCategory::Range).unwrap();
        assert_eq!(json, "\"range\"");
    }

    #[test]
    fn keyboard_key_must_be_one_char() {
        assert_eq!(parse_keyboard_key("g").unwrap(), 'g');
        assert_eq!(parse_keyboard_key("é").unwrap(), 'é');
        assert!(parse_keyboard_key("").is_err());
        assert!(parse_keyboard_key("gg").is_err());
    }

    #[test]
    fn begin_copies_type_fields() {
        let single = EventInstance::begin(&event_type(EventCategory::Single), 2.5);
        assert_eq!(single.event_type_id, EventTypeId(7));
        assert_eq!(single.category, EventCategory::Single);
        assert!(single.end_timestamp.is_none());
        assert!(!single.is_open());

        let range = EventInstance::begin(&event_type(EventCategory::Range), 2.5);
        assert!(range.is_open());
    }

    #[test]
    fn point_and_open_range_constructors() {
        let point = EventInstance::point(&event_type(EventCategory::Single), 4.0);
        assert_eq!(point.category, EventCategory::Single);
        assert!(!point.is_open());

        let range = EventInstance::open_range(&event_type(EventCategory::Range), 4.0);
        assert!((range.start_timestamp - 4.0).abs() < f64::EPSILON);
        assert!(range.is_open());
        assert_ne!(point.event_id, range.event_id);
    }

    #[test]
    fn instance_serde_omits_missing_end() {
        let instance = EventInstance {
            event_id: EventId::new("a").unwrap(),
            event_type_id: EventTypeId(1),
            category: EventCategory::Single,
            start_timestamp: 1.0,
            end_timestamp: None,
        };
        let json = serde_json::to_string(&instance).unwrap();
        assert!(!json.contains("end_timestamp"));
        let parsed: EventInstance = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, instance);
    }
}
