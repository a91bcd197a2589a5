//! attendance: replays recorded attendance event logs.
//!
//! Feeds a JSON-lines event log through the attendance tracker the way a live
//! host would, saving reports along the way when `save_locally` is set.
//!
//! ## Subcommands
//!
//! - `replay`: Ingest an event log and print the requested reports
//! - `check-config`: Print the effective configuration

mod export;
mod logging;
mod replay;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "attendance")]
#[command(about = "Event attendance tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a JSON-lines event log and print the reports it asks for
    Replay {
        /// Event log, one JSON object per line
        #[arg(long, value_name = "PATH")]
        events: PathBuf,

        /// Config file (defaults to the user config directory)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Directory for saved reports
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// How printed reports are rendered
        #[arg(long, value_enum, default_value_t = RenderFormat::Text)]
        format: RenderFormat,
    },

    /// Print the configuration after defaults are applied
    CheckConfig {
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    /// Plain text, as copied to the clipboard
    Text,
    /// Panel markup with colored rows
    Html,
    /// Structured lines with tones
    Json,
}

fn main() {
    logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay {
            events,
            config,
            out_dir,
            format,
        } => replay::run(&replay::ReplayOptions {
            events,
            config,
            out_dir,
            format,
        }),
        Commands::CheckConfig { config } => check_config(config),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "attendance failed");
        std::process::exit(1);
    }
}

fn check_config(path: Option<PathBuf>) -> Result<(), String> {
    let config = attendance_core::load_config(path)?;
    let rendered = serde_json::to_string_pretty(&config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    println!("{}", rendered);
    Ok(())
}
