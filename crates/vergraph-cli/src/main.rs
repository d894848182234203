//! Vergraph CLI - Inspect entity datasets and replay edit sessions

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod dataset;
mod output;
mod report;
mod script;

use commands::{completions, inspect, replay};
use config::{config_file_path, Config};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "vergraph")]
#[command(author, version, about = "Versioned entity graph toolkit")]
pub struct Cli {
    /// Output format: table, json (defaults to the configured format)
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Config file
    #[arg(long, global = true, env = "VERGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the config file path
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config_file_path)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a dataset and print a summary or one entity
    Inspect(inspect::InspectArgs),
    /// Replay an edit script over a dataset
    Replay(replay::ReplayArgs),
    /// Manage CLI configuration
    Config(commands::config::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Settings resolved from the config file and global flags
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
    /// Why the config file was ignored, logged once tracing is up
    pub config_error: Option<String>,
}

impl AppContext {
    pub fn new(cli: &Cli) -> Self {
        let config_path = cli.config_path();
        let (config, config_error) = match Config::load_from(&config_path) {
            Ok(config) => (config, None),
            Err(err) => (Config::default(), Some(format!("{:#}", err))),
        };
        let format = cli
            .format
            .as_deref()
            .unwrap_or(config.output_format.as_str())
            .into();

        Self {
            config,
            config_path,
            format,
            config_error,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let ctx = AppContext::new(&cli);

    // Set up logging based on verbosity, falling back to the configured level
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => ctx.config.log_level.as_deref().unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    if let Some(err) = &ctx.config_error {
        tracing::warn!("Ignoring config: {}", err);
    }
    tracing::debug!("Using config at: {:?}", ctx.config_path);

    match &cli.command {
        Commands::Inspect(args) => inspect::run(args, &ctx)?,
        Commands::Replay(args) => replay::run(args, &ctx)?,
        Commands::Config(args) => commands::config::run(args, &ctx)?,
        Commands::Completions(args) => completions::run(args)?,
    }

    Ok(())
}
