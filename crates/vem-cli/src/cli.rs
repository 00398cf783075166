//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use vem_core::{EventCategory, EventTypeDraft};

/// Video event marker.
///
/// Marks timestamped events on a video with keyboard triggers and exports
/// them as CSV.
#[derive(Debug, Parser)]
#[command(name = "vem", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create and inspect analyses.
    #[command(subcommand)]
    Analysis(AnalysisAction),

    /// Replay a capture script against an analysis and save the result.
    Capture {
        /// The analysis ID.
        id: i64,

        /// JSON-lines script of player actions.
        #[arg(long)]
        script: PathBuf,

        /// Split each event type's ranges into disjoint pieces before saving.
        #[arg(long)]
        split: bool,
    },

    /// Export the saved capture of an analysis as CSV.
    Export {
        /// The analysis ID.
        id: i64,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Analysis subcommands.
#[derive(Debug, Subcommand)]
pub enum AnalysisAction {
    /// Create an analysis for a video.
    Add {
        /// Analysis name; defaults to the video's file name.
        #[arg(long)]
        name: Option<String>,

        /// Path to the video file.
        #[arg(long)]
        video: String,

        /// Video duration in seconds.
        #[arg(long)]
        duration: f64,

        /// Event type as NAME=KEY:CATEGORY (KEY is one character, category is
        /// `single` or `range`).
        #[arg(long = "event", value_parser = parse_event_draft)]
        events: Vec<EventTypeDraft>,
    },

    /// List analyses, most recently opened first.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show an analysis and its event types.
    Show {
        /// The analysis ID.
        id: i64,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Parses `NAME=KEY:CATEGORY` into an event type draft.
///
/// The category is split off at the last `:` and the key is the single
/// character before it, so `=` and `:` are bindable keys.
pub fn parse_event_draft(value: &str) -> Result<EventTypeDraft, String> {
    let malformed =
        || format!("expected NAME=KEY:CATEGORY with a one-character KEY, got {value:?}");
    let (binding, category) = value.rsplit_once(':').ok_or_else(malformed)?;
    let mut chars = binding.chars();
    let keyboard_key = chars.next_back().ok_or_else(malformed)?;
    let name = chars.as_str().strip_suffix('=').ok_or_else(malformed)?;
    let category = category
        .parse::<EventCategory>()
        .map_err(|e| e.to_string())?;

    Ok(EventTypeDraft::new(name, keyboard_key, category))
}
