// SPDX-License-Identifier: GPL-3.0-only

use camera_filters::backends::SourceSpec;
use camera_filters::config::Config;
use camera_filters::filters::{ColorFilter, WarpMode};
use camera_filters::terminal::{self, TerminalOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-filters")]
#[command(about = "Real-time GPU filters for camera frames")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ~/.config/camera-filters/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the GPU adapter the pipeline would use
    Info,

    /// Filter frames headlessly and report throughput
    Run {
        /// Frame source: "pattern" or an image path
        #[arg(short, long, default_value = "pattern")]
        source: SourceSpec,

        /// Color filter name (e.g. "sepia", "edge-detection")
        #[arg(short, long, default_value = "none")]
        filter: ColorFilter,

        /// Vertex warp name (e.g. "sine-wave", "magnify")
        #[arg(short, long, default_value = "none")]
        warp: WarpMode,

        /// Output width (default: source width)
        #[arg(long)]
        width: Option<u32>,

        /// Output height (default: source height)
        #[arg(long)]
        height: Option<u32>,

        /// How long to run
        #[arg(long, default_value = "5")]
        seconds: u64,
    },

    /// Preview filtered frames in the terminal
    Terminal {
        /// Frame source: "pattern" or an image path
        #[arg(short, long, default_value = "pattern")]
        source: SourceSpec,

        /// Initial color filter
        #[arg(short, long, default_value = "none")]
        filter: ColorFilter,

        /// Initial vertex warp
        #[arg(short, long, default_value = "none")]
        warp: WarpMode,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Log output would corrupt the terminal preview unless explicitly requested
    // Examples: RUST_LOG=debug, RUST_LOG=camera_filters=debug
    let default_level = match cli.command {
        Commands::Terminal { .. } => "off",
        _ => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Info => cli::show_info(&config),
        Commands::Run {
            source,
            filter,
            warp,
            width,
            height,
            seconds,
        } => cli::run_headless(
            &config,
            cli::RunOptions {
                source,
                filter,
                warp,
                width,
                height,
                seconds,
            },
        ),
        Commands::Terminal {
            source,
            filter,
            warp,
        } => terminal::run(TerminalOptions {
            config,
            source,
            filter,
            warp,
        }),
    }
}
