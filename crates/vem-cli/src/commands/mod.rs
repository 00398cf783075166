//! CLI subcommand implementations.

pub mod analysis;
pub mod capture;
pub mod export;
