//! Export command: writes the saved capture of an analysis as CSV.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};

use vem_core::{AnalysisId, EXPORT_HEADER, export_rows};
use vem_db::Database;

/// Writes the CSV export of `id` to `writer`, returning the number of rows.
pub fn run<W: Write>(writer: W, db: &Database, id: AnalysisId) -> Result<usize> {
    let Some(found) = db.get_analysis(id)? else {
        bail!("analysis {id} not found");
    };
    let events = db.list_events(id)?;
    let rows = export_rows(&events, &found.event_types)?;

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(EXPORT_HEADER)?;
    for row in &rows {
        csv.write_record(row.record())?;
    }
    csv.flush()?;

    tracing::debug!(analysis_id = %id, rows = rows.len(), "capture exported");
    Ok(rows.len())
}

/// Writes the CSV export of `id` to a file.
pub fn to_file(db: &Database, id: AnalysisId, path: &Path) -> Result<usize> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    run(file, db, id).with_context(|| format!("failed to export to {}", path.display()))
}
