//! Setup-time validation of event type drafts.
//!
//! Problems are collected and returned so the setup form can show all of
//! them at once. Capture must not start while any remain.

use std::collections::HashSet;

use thiserror::Error;

use crate::capture::PLAY_PAUSE_KEY;
use crate::types::EventTypeDraft;

/// A problem with the event types entered for an analysis.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    #[error("All events must have a name")]
    MissingName,

    #[error("All event names must be unique")]
    DuplicateName,

    #[error("All event keys must be unique")]
    DuplicateKey,

    #[error("The space key is reserved for play/pause")]
    ReservedKey,
}

/// Validates a set of event type drafts.
///
/// A missing name short-circuits the other checks. Names are compared after
/// trimming, ignoring case.
pub fn validate_event_types(drafts: &[EventTypeDraft]) -> Vec<SetupError> {
    let names: Vec<String> = drafts
        .iter()
        .map(|draft| draft.name.trim().to_lowercase())
        .collect();

    if names.iter().any(String::is_empty) {
        return vec![SetupError::MissingName];
    }

    let mut errors = Vec::new();

    let mut seen_names = HashSet::new();
    if !names.iter().all(|name| seen_names.insert(name.as_str())) {
        errors.push(SetupError::DuplicateName);
    }

    let mut seen_keys = HashSet::new();
    if !drafts.iter().all(|draft| seen_keys.insert(draft.keyboard_key)) {
        errors.push(SetupError::DuplicateKey);
    }

    if drafts.iter().any(|draft| draft.keyboard_key == PLAY_PAUSE_KEY) {
        errors.push(SetupError::ReservedKey);
    }

    errors
}
