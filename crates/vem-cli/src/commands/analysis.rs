//! Analysis commands: create, list and show.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use vem_core::{AnalysisId, EventType, EventTypeDraft, format_timestamp, validate_event_types};
use vem_db::{AnalysisRecord, Database, NewAnalysis};

/// An analysis as rendered by `--json`.
#[derive(Debug, Serialize)]
struct AnalysisView<'a> {
    id: AnalysisId,
    name: &'a str,
    path: &'a str,
    duration: f64,
    created_at: &'a str,
    updated_at: &'a str,
    last_opened_at: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_types: Option<&'a [EventType]>,
}

impl<'a> AnalysisView<'a> {
    fn new(record: &'a AnalysisRecord, event_types: Option<&'a [EventType]>) -> Self {
        Self {
            id: record.id,
            name: &record.name,
            path: &record.path,
            duration: record.duration,
            created_at: &record.created_at,
            updated_at: &record.updated_at,
            last_opened_at: &record.last_opened_at,
            event_types,
        }
    }
}

/// Validates the setup and creates the analysis.
///
/// Every setup problem is reported at once; nothing is written unless all
/// event types are valid.
pub fn add<W: Write>(
    writer: &mut W,
    db: &mut Database,
    name: Option<&str>,
    video: &str,
    duration: f64,
    events: &[EventTypeDraft],
) -> Result<AnalysisId> {
    let errors = validate_event_types(events);
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("invalid event types:\n  {}", messages.join("\n  "));
    }
    if !duration.is_finite() || duration <= 0.0 {
        bail!("duration must be a positive number of seconds, got {duration}");
    }

    let name = name.unwrap_or_else(|| video_file_name(video)).trim();
    if name.is_empty() {
        bail!("analysis name must not be empty");
    }

    let id = db
        .add_analysis(&NewAnalysis {
            name: name.to_string(),
            path: video.to_string(),
            duration,
            event_types: events.to_vec(),
        })
        .context("failed to create analysis")?;

    writeln!(writer, "Created analysis {id}")?;
    Ok(id)
}

/// Lists analyses, most recently opened first.
pub fn list<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let analyses = db.list_analyses()?;

    if json {
        let views: Vec<AnalysisView<'_>> = analyses
            .iter()
            .map(|record| AnalysisView::new(record, None))
            .collect();
        writeln!(writer, "{}", serde_json::to_string_pretty(&views)?)?;
        return Ok(());
    }

    if analyses.is_empty() {
        writeln!(writer, "No analyses yet.")?;
        writeln!(writer)?;
        writeln!(
            writer,
            "Hint: Run 'vem analysis add --video <file> --duration <secs> --event NAME=KEY:CATEGORY'."
        )?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<4}  {:<24}  {:>9}  Last opened",
        "ID", "Name", "Duration"
    )?;
    for record in &analyses {
        writeln!(
            writer,
            "{:<4}  {:<24}  {:>9}  {}",
            record.id,
            truncate(&record.name, 24),
            format!("{}s", format_timestamp(record.duration)),
            record.last_opened_at
        )?;
    }
    Ok(())
}

/// Shows one analysis and its event types.
pub fn show<W: Write>(writer: &mut W, db: &Database, id: AnalysisId, json: bool) -> Result<()> {
    let Some(found) = db.get_analysis(id)? else {
        bail!("analysis {id} not found");
    };

    if json {
        let view = AnalysisView::new(&found.analysis, Some(&found.event_types));
        writeln!(writer, "{}", serde_json::to_string_pretty(&view)?)?;
        return Ok(());
    }

    let analysis = &found.analysis;
    writeln!(writer, "Analysis {}: {}", analysis.id, analysis.name)?;
    writeln!(writer, "Video: {}", analysis.path)?;
    writeln!(writer, "Duration: {}s", format_timestamp(analysis.duration))?;
    writeln!(writer, "Event types:")?;
    if found.event_types.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for event_type in &found.event_types {
        writeln!(
            writer,
            "  [{}] {} ({})",
            event_type.keyboard_key, event_type.name, event_type.category
        )?;
    }
    Ok(())
}

fn video_file_name(video: &str) -> &str {
    Path::new(video)
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or(video)
}

// Truncate by characters, not bytes, to avoid panics on multi-byte UTF-8
fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() > width {
        format!("{}...", name.chars().take(width - 3).collect::<String>())
    } else {
        name.to_string()
    }
}
