//! Capture command: replays a script of player actions against an analysis.
//!
//! A script is a JSON-lines file, one step per line, tagged by `op`:
//!
//! ```text
//! {"op": "play"}
//! {"op": "advance", "seconds": 2.5}
//! {"op": "key", "key": "r"}
//! {"op": "status"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Time only moves on
//! `advance` (wall-clock seconds, scaled by the playback rate) and `seek`.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use vem_core::{
    AnalysisId, CaptureSession, EventType, IgnoreReason, InputEvent, KeyOutcome, ManualClock,
    PLAY_PAUSE_KEY, PlaybackClock, Transition, format_elapsed, format_timestamp, split_events,
};
use vem_db::Database;

use crate::CaptureSettings;

/// One player action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptStep {
    Play,
    Pause,
    /// Presses the play/pause key.
    Toggle,
    Key {
        key: char,
    },
    Advance {
        seconds: f64,
    },
    Seek {
        to: f64,
    },
    Rate {
        value: f64,
    },
    /// Deletes the event at a 1-based row of the current flat listing.
    Remove {
        row: usize,
    },
    /// Prints the clock and the ranges still being captured.
    Status,
}

/// Parses a JSON-lines script.
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str(line)
            .with_context(|| format!("line {}: invalid script step", index + 1))?;
        steps.push(step);
    }
    Ok(steps)
}

/// Reads and parses a script file.
pub fn load_script(path: &Path) -> Result<Vec<ScriptStep>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read script {}", path.display()))?;
    parse_script(&text).with_context(|| format!("failed to parse script {}", path.display()))
}

/// Replays `steps` on top of the saved capture and saves the result.
///
/// The player starts at the configured rate, playing when `autoplay` is set.
/// Returns the number of saved events.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    id: AnalysisId,
    steps: &[ScriptStep],
    settings: &CaptureSettings,
) -> Result<usize> {
    let Some(found) = db.get_analysis(id)? else {
        bail!("analysis {id} not found");
    };
    db.mark_opened(id)?;
    let saved = db.list_events(id)?;
    tracing::debug!(analysis_id = %id, saved = saved.len(), steps = steps.len(), "replaying capture");

    let mut clock = ManualClock::with_duration(found.analysis.duration);
    clock.set_playback_rate(settings.playback_rate);
    if settings.autoplay {
        clock.play();
    }
    let mut session = CaptureSession::resume(found.event_types, clock, saved);

    for step in steps {
        apply(writer, &mut session, step)?;
    }

    let unfinished = session.in_progress().len();
    if unfinished > 0 {
        writeln!(writer, "Discarded {unfinished} unfinished range(s)")?;
    }

    let mut events = session.finish();
    if settings.split {
        events = split_events(&events);
    }
    let count = db
        .replace_events(id, &events)
        .context("failed to save capture")?;

    writeln!(writer, "Saved {count} events for analysis {id}")?;
    Ok(count)
}

fn apply<W: Write>(
    writer: &mut W,
    session: &mut CaptureSession<ManualClock>,
    step: &ScriptStep,
) -> Result<()> {
    match step {
        ScriptStep::Play => session.clock_mut().play(),
        ScriptStep::Pause => session.clock_mut().pause(),
        ScriptStep::Toggle => press(writer, session, PLAY_PAUSE_KEY)?,
        ScriptStep::Key { key } => press(writer, session, *key)?,
        ScriptStep::Advance { seconds } => {
            session.clock_mut().advance(*seconds);
            session.dispatch(InputEvent::Tick);
        }
        ScriptStep::Seek { to } => {
            session.clock_mut().seek(*to);
            session.dispatch(InputEvent::Tick);
        }
        ScriptStep::Rate { value } => {
            let applied = session.clock_mut().set_playback_rate(*value);
            if applied.factor().total_cmp(value).is_ne() {
                writeln!(writer, "Rate {value}x is not supported, playing at {applied}")?;
            }
        }
        ScriptStep::Remove { row } => {
            let snapshot = session.snapshot();
            match row.checked_sub(1).and_then(|index| snapshot.get(index)) {
                Some(event) => {
                    session.remove_event(&event.event_id, event.event_type_id);
                    let name = type_name(session.event_types(), |t| t.id == event.event_type_id);
                    writeln!(
                        writer,
                        "Removed {name} at {}",
                        format_timestamp(event.start_timestamp)
                    )?;
                }
                None => writeln!(writer, "No event at row {row}")?,
            }
        }
        ScriptStep::Status => status(writer, session)?,
    }
    Ok(())
}

fn press<W: Write>(
    writer: &mut W,
    session: &mut CaptureSession<ManualClock>,
    key: char,
) -> Result<()> {
    let Some(outcome) = session.dispatch(InputEvent::KeyDown(key)) else {
        return Ok(());
    };
    let now = format_timestamp(session.clock().current_time());
    let name = type_name(session.event_types(), |t| t.keyboard_key == key);

    match outcome {
        KeyOutcome::PlaybackToggled { playing } => {
            let state = if playing { "playing" } else { "paused" };
            writeln!(writer, "[{now}] {state}")?;
        }
        KeyOutcome::Ignored(reason) => {
            writeln!(writer, "[{now}] {key:?} ignored: {}", describe(reason))?;
        }
        KeyOutcome::Recorded(transition) => match transition {
            Transition::Point { .. } => writeln!(writer, "[{now}] {name} marked")?,
            Transition::Duplicate { .. } => writeln!(writer, "[{now}] {name} already marked")?,
            Transition::Opened { .. } => writeln!(writer, "[{now}] {name} started")?,
            Transition::Closed { start, end, .. } => writeln!(
                writer,
                "[{now}] {name} closed {}-{}",
                format_timestamp(start),
                format_timestamp(end)
            )?,
            Transition::Merged {
                start,
                end,
                absorbed,
                ..
            } => {
                let end = end.map_or_else(|| "open".to_string(), format_timestamp);
                writeln!(
                    writer,
                    "[{now}] {name} merged {} ranges into {}-{end}",
                    absorbed.len() + 1,
                    format_timestamp(start)
                )?;
            }
        },
    }
    Ok(())
}

fn status<W: Write>(writer: &mut W, session: &CaptureSession<ManualClock>) -> Result<()> {
    let clock = session.clock();
    let state = if clock.is_playing() { "playing" } else { "paused" };
    writeln!(
        writer,
        "[{}] {state} at {}",
        format_timestamp(session.playhead()),
        clock.playback_rate()
    )?;

    for open in session.in_progress() {
        let name = type_name(session.event_types(), |t| t.id == open.event_type_id);
        writeln!(
            writer,
            "  {name} since {} ({})",
            format_timestamp(open.start_timestamp),
            format_elapsed(open.elapsed)
        )?;
    }
    Ok(())
}

fn type_name(event_types: &[EventType], matches: impl Fn(&EventType) -> bool) -> &str {
    event_types
        .iter()
        .find(|t| matches(t))
        .map_or("(unknown)", |t| t.name.as_str())
}

const fn describe(reason: IgnoreReason) -> &'static str {
    match reason {
        IgnoreReason::UnboundKey => "no event type is bound to this key",
        IgnoreReason::UnknownEventType => "unknown event type",
        IgnoreReason::Paused => "playback is paused",
        IgnoreReason::BeforeOpenStart => "the open range has not started yet",
    }
}
