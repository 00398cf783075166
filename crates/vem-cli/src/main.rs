use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vem_cli::commands::{analysis, capture, export};
use vem_cli::{AnalysisAction, Cli, Commands, Config};
use vem_core::AnalysisId;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(vem_db::Database, Config)> {
    let config = Config::load(config_path)?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = vem_db::Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Analysis(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                AnalysisAction::Add {
                    name,
                    video,
                    duration,
                    events,
                } => {
                    analysis::add(&mut stdout, &mut db, name.as_deref(), video, *duration, events)?;
                }
                AnalysisAction::List { json } => analysis::list(&mut stdout, &db, *json)?,
                AnalysisAction::Show { id, json } => {
                    analysis::show(&mut stdout, &db, AnalysisId(*id), *json)?;
                }
            }
        }
        Some(Commands::Capture { id, script, split }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            let steps = capture::load_script(script)?;
            let mut settings = config.capture;
            settings.split |= *split;
            capture::run(&mut stdout, &mut db, AnalysisId(*id), &steps, &settings)?;
        }
        Some(Commands::Export { id, output }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match output {
                Some(path) => export::to_file(&db, AnalysisId(*id), path)?,
                None => export::run(&mut stdout, &db, AnalysisId(*id))?,
            };
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
