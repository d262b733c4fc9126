//! # Locus CLI
//!
//! Command-line interface for the Locus file-location index.
//!
//! ## Commands
//!
//! - `locus list` - Snapshot the root and print every matching file
//! - `locus find <regex>` - Print the first matching file
//! - `locus watch` - Keep a live index and answer queries from stdin
//!
//! ## Example Usage
//!
//! ```bash
//! # Every mp3 under ~/Music
//! locus --root ~/Music --pattern '*.mp3' list
//!
//! # First cached path mentioning Beethoven
//! locus --root ~/Music find 'Beethoven'
//!
//! # Live index, one regex per line on stdin
//! locus --root ~/Music watch
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Locus - always-current file location index
#[derive(Parser)]
#[command(name = "locus")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    overrides: app::Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every indexed file
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Print the first indexed file whose path matches a regex
    Find {
        /// Regular expression matched against the full path
        regex: String,

        /// Print every match instead of the first
        #[arg(short, long)]
        all: bool,
    },

    /// Keep the index live and answer queries read from stdin
    Watch,
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => locus_core::Config::load_from(path)?,
        None => locus_core::Config::load()?,
    };

    // Setup logging
    let log_level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.general.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let app = app::App::new(config, &cli.overrides)?;

    // Execute command
    let found = match cli.command {
        Commands::List { output } => commands::list::run(&app, output).map(|()| true),
        Commands::Find { regex, all } => commands::find::run(&app, &regex, all),
        Commands::Watch => commands::watch::run(&app).map(|()| true),
    }?;

    if !found {
        std::process::exit(1);
    }
    Ok(())
}
