// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand, ValueEnum};
use persona_feed::backends::capture::CaptureBackendType;
use persona_feed::constants::app_info;
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "persona-feed")]
#[command(about = "Apply a persona face to a live camera feed")]
#[command(version = app_info::version())]
struct Cli {
    /// Configuration file (default: ~/.config/persona-feed/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at info level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a headless swapping session
    Run {
        /// Persona image (file path, URL or data URL)
        #[arg(short, long)]
        persona: String,

        /// Display name for the persona
        #[arg(short, long, default_value = "persona")]
        name: String,

        /// Capture backend
        #[arg(short, long, value_enum)]
        backend: Option<BackendArg>,

        /// Image file or directory served by the still-image backend
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Seconds between swap requests
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many seconds (default: run until Ctrl+C)
        #[arg(short, long)]
        duration: Option<u64>,

        /// Directory for result frames (default: ~/Pictures/persona-feed)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Swap a single image
    Swap {
        /// Source image (file path or URL)
        #[arg(short, long)]
        source: String,

        /// Persona image (file path, URL or data URL)
        #[arg(short, long)]
        target: String,

        /// Previous result to stay consistent with
        #[arg(short, long)]
        anchor: Option<String>,

        /// Output file path (default: ~/Pictures/persona-feed/swap_TIMESTAMP.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a face description for a persona image
    Refine {
        /// Persona image (file path, URL or data URL)
        image: String,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(short, long)]
        write: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Still image or directory of images
    StillImage,
    /// GStreamer camera pipeline
    Gstreamer,
}

impl From<BackendArg> for CaptureBackendType {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::StillImage => CaptureBackendType::StillImage,
            BackendArg::Gstreamer => CaptureBackendType::Gstreamer,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    // Set RUST_LOG environment variable to control log level
    // Examples: RUST_LOG=debug, RUST_LOG=persona_feed=debug, RUST_LOG=info
    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let config_path = cli.config;

    match cli.command {
        Commands::Run {
            persona,
            name,
            backend,
            source,
            interval,
            duration,
            output,
        } => cli::run_session(cli::RunOptions {
            config_path,
            persona,
            name,
            backend: backend.map(Into::into),
            source,
            interval,
            duration,
            output,
        }),
        Commands::Swap {
            source,
            target,
            anchor,
            output,
        } => cli::swap_once(config_path, source, target, anchor, output),
        Commands::Refine { image } => cli::refine(config_path, image),
        Commands::Config { write } => cli::show_config(config_path, write),
    }
}
