//! Video event marker CLI library.
//!
//! This crate provides the CLI interface for marking events on videos.

mod cli;
pub mod commands;
mod config;

pub use cli::{AnalysisAction, Cli, Commands};
pub use config::{CaptureSettings, Config};
