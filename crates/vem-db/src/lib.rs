//! Storage layer for video event analyses.
//!
//! Provides persistence for analyses, their event types, and captured event
//! instances using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A capture session is single-threaded; hosts that share a database across
//! threads should wrap it in a `Mutex<Database>`.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Bookkeeping timestamps (`created_at`, `updated_at`, `last_opened_at`) are
//! stored as TEXT in RFC 3339 format (e.g., `2024-01-15T10:30:00Z`).
//! Event timestamps are REAL seconds of media time.
//!
//! ## Captured Events
//!
//! `analysis_events` holds the saved capture of an analysis as a flat
//! sequence. A save replaces the whole capture in one transaction.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use vem_core::{
    AnalysisId, EventCategory, EventId, EventInstance, EventType, EventTypeDraft, EventTypeId,
    ValidationError, parse_keyboard_key, total_order,
};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored value failed domain validation.
    #[error("invalid stored value in {table}: {source}")]
    InvalidRow {
        table: &'static str,
        #[source]
        source: ValidationError,
    },
    /// Inserting an analysis did not create exactly one row.
    #[error("failed to insert analysis {0:?}")]
    InsertFailed(String),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// An analysis row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub name: String,
    pub path: String,
    pub duration: f64,
    pub created_at: String,
    pub updated_at: String,
    pub last_opened_at: String,
}

/// An analysis with its event types.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisWithEventTypes {
    pub analysis: AnalysisRecord,
    pub event_types: Vec<EventType>,
}

/// Input for creating an analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAnalysis {
    pub name: String,
    pub path: String,
    pub duration: f64,
    pub event_types: Vec<EventTypeDraft>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS analyses (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                path TEXT NOT NULL,
                duration REAL NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_opened_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analysis_event_types (
                id INTEGER PRIMARY KEY,
                analysis_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                keyboard_key TEXT NOT NULL,
                category TEXT NOT NULL CHECK (category IN ('single', 'range')),
                UNIQUE (analysis_id, keyboard_key),
                FOREIGN KEY (analysis_id) REFERENCES analyses(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_event_types_analysis ON analysis_event_types(analysis_id);

            -- Saved capture: one row per event instance
            -- start_timestamp/end_timestamp: seconds of media time
            CREATE TABLE IF NOT EXISTS analysis_events (
                id TEXT PRIMARY KEY,
                analysis_id INTEGER NOT NULL,
                event_type_id INTEGER NOT NULL,
                start_timestamp REAL NOT NULL,
                end_timestamp REAL,
                FOREIGN KEY (analysis_id) REFERENCES analyses(id) ON DELETE CASCADE,
                FOREIGN KEY (event_type_id) REFERENCES analysis_event_types(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_events_analysis ON analysis_events(analysis_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts an analysis and its event types in one transaction.
    pub fn add_analysis(&mut self, analysis: &NewAnalysis) -> Result<AnalysisId, DbError> {
        self.add_analysis_at(analysis, Utc::now())
    }

    fn add_analysis_at(
        &mut self,
        analysis: &NewAnalysis,
        now: DateTime<Utc>,
    ) -> Result<AnalysisId, DbError> {
        let now = format_timestamp(now);
        let tx = self.conn.transaction()?;
        let inserted = tx.execute(
            "
            INSERT INTO analyses (name, path, duration, created_at, updated_at, last_opened_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![analysis.name, analysis.path, analysis.duration, now, now, now],
        )?;
        if inserted != 1 {
            return Err(DbError::InsertFailed(analysis.name.clone()));
        }
        let analysis_id = tx.last_insert_rowid();
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO analysis_event_types (analysis_id, name, keyboard_key, category)
                VALUES (?, ?, ?, ?)
                ",
            )?;
            for draft in &analysis.event_types {
                stmt.execute(params![
                    analysis_id,
                    draft.name.trim(),
                    draft.keyboard_key.to_string(),
                    draft.category.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(analysis_id, event_types = analysis.event_types.len(), "analysis created");
        Ok(AnalysisId(analysis_id))
    }

    /// Lists analyses, most recently opened first.
    pub fn list_analyses(&self) -> Result<Vec<AnalysisRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, name, path, duration, created_at, updated_at, last_opened_at
            FROM analyses
            ORDER BY last_opened_at DESC, id DESC
            ",
        )?;
        let rows = stmt.query_map([], analysis_from_row)?;
        let mut analyses = Vec::new();
        for row in rows {
            analyses.push(row?);
        }
        Ok(analyses)
    }

    /// Fetches an analysis with its event types.
    pub fn get_analysis(
        &self,
        id: AnalysisId,
    ) -> Result<Option<AnalysisWithEventTypes>, DbError> {
        let analysis = self
            .conn
            .query_row(
                "
                SELECT id, name, path, duration, created_at, updated_at, last_opened_at
                FROM analyses
                WHERE id = ?
                ",
                [id.get()],
                analysis_from_row,
            )
            .optional()?;
        let Some(analysis) = analysis else {
            return Ok(None);
        };
        let event_types = self.list_event_types(id)?;
        Ok(Some(AnalysisWithEventTypes {
            analysis,
            event_types,
        }))
    }

    fn list_event_types(&self, analysis_id: AnalysisId) -> Result<Vec<EventType>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, analysis_id, name, keyboard_key, category
            FROM analysis_event_types
            WHERE analysis_id = ?
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([analysis_id.get()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut event_types = Vec::new();
        for row in rows {
            let (id, analysis_id, name, key, category) = row?;
            event_types.push(EventType {
                id: EventTypeId(id),
                analysis_id: AnalysisId(analysis_id),
                name,
                keyboard_key: parse_keyboard_key(&key).map_err(invalid("analysis_event_types"))?,
                category: category
                    .parse()
                    .map_err(invalid("analysis_event_types"))?,
            });
        }
        Ok(event_types)
    }

    /// Records that an analysis was opened.
    pub fn mark_opened(&mut self, id: AnalysisId) -> Result<bool, DbError> {
        let now = format_timestamp(Utc::now());
        let updated = self.conn.execute(
            "UPDATE analyses SET last_opened_at = ? WHERE id = ?",
            params![now, id.get()],
        )?;
        Ok(updated == 1)
    }

    /// Replaces the saved capture of an analysis.
    pub fn replace_events(
        &mut self,
        analysis_id: AnalysisId,
        events: &[EventInstance],
    ) -> Result<usize, DbError> {
        let now = format_timestamp(Utc::now());
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM analysis_events WHERE analysis_id = ?",
            [analysis_id.get()],
        )?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO analysis_events
                (id, analysis_id, event_type_id, start_timestamp, end_timestamp)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                inserted += stmt.execute(params![
                    event.event_id.as_str(),
                    analysis_id.get(),
                    event.event_type_id.get(),
                    event.start_timestamp,
                    event.end_timestamp,
                ])?;
            }
        }
        tx.execute(
            "UPDATE analyses SET updated_at = ? WHERE id = ?",
            params![now, analysis_id.get()],
        )?;
        tx.commit()?;
        tracing::debug!(%analysis_id, inserted, "capture saved");
        Ok(inserted)
    }

    /// Lists the saved capture of an analysis in flat total order.
    pub fn list_events(&self, analysis_id: AnalysisId) -> Result<Vec<EventInstance>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT e.id, e.event_type_id, t.category, e.start_timestamp, e.end_timestamp
            FROM analysis_events e
            JOIN analysis_event_types t ON t.id = e.event_type_id
            WHERE e.analysis_id = ?
            ",
        )?;
        let rows = stmt.query_map([analysis_id.get()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<f64>>(4)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (id, event_type_id, category, start_timestamp, end_timestamp) = row?;
            let category: EventCategory =
                category.parse().map_err(invalid("analysis_event_types"))?;
            events.push(EventInstance {
                event_id: EventId::new(id).map_err(invalid("analysis_events"))?,
                event_type_id: EventTypeId(event_type_id),
                category,
                start_timestamp,
                end_timestamp,
            });
        }
        events.sort_by(total_order);
        Ok(events)
    }
}

fn analysis_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnalysisRecord> {
    Ok(AnalysisRecord {
        id: AnalysisId(row.get(0)?),
        name: row.get(1)?,
        path: row.get(2)?,
        duration: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        last_opened_at: row.get(6)?,
    })
}

fn invalid(table: &'static str) -> impl Fn(ValidationError) -> DbError {
    move |source| DbError::InvalidRow { table, source }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn new_analysis() -> NewAnalysis {
        NewAnalysis {
            name: "Final".to_string(),
            path: "/videos/final.mp4".to_string(),
            duration: 5400.0,
            event_types: vec![
                EventTypeDraft::new("Rally", 'r', EventCategory::Range),
                EventTypeDraft::new(" Point ", 'p', EventCategory::Single),
            ],
        }
    }

    fn instance(id: &str, type_id: EventTypeId, start: f64, end: Option<f64>) -> EventInstance {
        EventInstance {
            event_id: EventId::new(id).unwrap(),
            event_type_id: type_id,
            category: if end.is_some() {
                EventCategory::Range
            } else {
                EventCategory::Single
            },
            start_timestamp: start,
            end_timestamp: end,
        }
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "analyses"),
            vec![
                "id",
                "name",
                "path",
                "duration",
                "created_at",
                "updated_at",
                "last_opened_at",
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "analysis_event_types"),
            vec!["id", "analysis_id", "name", "keyboard_key", "category"]
        );
        assert_eq!(
            table_columns(&db.conn, "analysis_events"),
            vec![
                "id",
                "analysis_id",
                "event_type_id",
                "start_timestamp",
                "end_timestamp",
            ]
        );

        let event_indexes = index_names(&db.conn, "analysis_events");
        assert!(event_indexes.contains("idx_events_analysis"));
        let type_indexes = index_names(&db.conn, "analysis_event_types");
        assert!(type_indexes.contains("idx_event_types_analysis"));
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    #[test]
    fn add_and_get_analysis_with_event_types() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let id = db.add_analysis(&new_analysis()).expect("add analysis");

        let loaded = db.get_analysis(id).expect("get analysis").expect("exists");
        assert_eq!(loaded.analysis.name, "Final");
        assert!((loaded.analysis.duration - 5400.0).abs() < f64::EPSILON);

        let names: Vec<_> = loaded.event_types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Rally", "Point"]);
        assert_eq!(loaded.event_types[0].keyboard_key, 'r');
        assert_eq!(loaded.event_types[0].category, EventCategory::Range);
        assert!(loaded.event_types.iter().all(|t| t.analysis_id == id));
    }

    #[test]
    fn missing_analysis_is_none() {
        let db = Database::open_in_memory().expect("open in-memory db");
        assert!(db.get_analysis(AnalysisId(99)).expect("query").is_none());
    }

    #[test]
    fn duplicate_keys_are_rejected_atomically() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let mut analysis = new_analysis();
        analysis.event_types[1].keyboard_key = 'r';

        assert!(db.add_analysis(&analysis).is_err());
        assert!(db.list_analyses().expect("list").is_empty());
    }

    #[test]
    fn list_analyses_orders_by_last_opened() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let early = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let late = DateTime::parse_from_rfc3339("2025-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let mut first = new_analysis();
        first.name = "First".to_string();
        db.add_analysis_at(&first, early).expect("add first");
        let mut second = new_analysis();
        second.name = "Second".to_string();
        db.add_analysis_at(&second, late).expect("add second");

        let names: Vec<_> = db
            .list_analyses()
            .expect("list")
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
        assert_eq!(
            db.list_analyses().unwrap()[0].created_at,
            "2025-02-01T00:00:00Z"
        );
    }

    #[test]
    fn replace_events_round_trips_capture() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let id = db.add_analysis(&new_analysis()).expect("add analysis");
        let types = db.get_analysis(id).unwrap().unwrap().event_types;
        let (rally, point) = (types[0].id, types[1].id);

        let events = vec![
            instance("b", rally, 2.0, Some(7.5)),
            instance("a", point, 1.25, None),
        ];
        assert_eq!(db.replace_events(id, &events).expect("save"), 2);

        let loaded = db.list_events(id).expect("list events");
        assert_eq!(loaded, vec![events[1].clone(), events[0].clone()]);

        db.replace_events(id, &events[..1]).expect("save again");
        assert_eq!(db.list_events(id).expect("list events").len(), 1);
    }

    #[test]
    fn mark_opened_reports_missing_analysis() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let id = db.add_analysis(&new_analysis()).expect("add analysis");
        assert!(db.mark_opened(id).expect("mark"));
        assert!(!db.mark_opened(AnalysisId(404)).expect("mark"));
    }

    #[test]
    fn reopening_file_database_keeps_data() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("vem.db");
        let id = {
            let mut db = Database::open(&path).expect("open");
            db.add_analysis(&new_analysis()).expect("add analysis")
        };
        let db = Database::open(&path).expect("reopen");
        assert!(db.get_analysis(id).expect("get").is_some());
    }
}
