//! Deepfake Detect CLI
//!
//! Runs the detection pipeline on local files, without the HTTP server.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::detect::DetectCommand;
use commands::inspect::InspectCommand;

#[derive(Parser)]
#[command(
    name = "deepfake-detect",
    version,
    about = "Classify videos as FAKE or REAL",
    after_help = "EXAMPLES:\n  \
                  # Classify files, one JSON line each\n  \
                  deepfake-detect detect clip1.mp4 clip2.mov\n\n  \
                  # Use a different model and 30 frames per video\n  \
                  deepfake-detect detect --model-path model/other.onnx --sequence-length 30 clip.mp4\n\n  \
                  # Show where faces are found in the first frames\n  \
                  deepfake-detect inspect clip.mp4"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more video files
    Detect(DetectCommand),

    /// Report face regions for the leading frames of a video
    Inspect(InspectCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // Results go to stdout, logs to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Detect(cmd) => cmd.execute(),
        Commands::Inspect(cmd) => cmd.execute(),
    }
}
