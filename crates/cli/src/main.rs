//! weekforge CLI: the main entry point.
//!
//! Commands:
//! - `generate`: Write, review, and compile one week
//! - `budget`:   Show how files pack into a model's context window
//! - `init`:     Write default config and section list
//! - `doctor`:   Check config, API keys, and input files

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "weekforge",
    about = "weekforge — multi-reviewer weekly course content generation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ./weekforge.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate, review, and compile one week of content
    Generate {
        /// Week number to generate
        #[arg(short, long)]
        week: u32,

        /// Section list (defaults to ./sections.toml, then the built-in eight)
        #[arg(short, long)]
        sections: Option<PathBuf>,

        /// Validate inputs and print the plan without calling the model
        #[arg(long)]
        dry_run: bool,
    },

    /// Pack files into a model's context window and report what survives
    Budget {
        /// Model whose limits apply (defaults to the configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Files to pack; the first is required, the rest follow in priority order
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default weekforge.toml and sections.toml
    Init {
        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Diagnose config and inputs
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Generate {
            week,
            sections,
            dry_run,
        } => commands::generate::run(config, week, sections.as_deref(), dry_run).await?,
        Commands::Budget { model, files, json } => {
            commands::budget::run(config, model.as_deref(), &files, json).await?
        }
        Commands::Init { force } => commands::init::run(config, force).await?,
        Commands::Doctor => commands::doctor::run(config).await?,
    }

    Ok(())
}
