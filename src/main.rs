//! `swipecap` CLI - Align, plan and render word-highlighted captions

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swipecap::AppConfig;

#[derive(Parser)]
#[command(name = "swipecap")]
#[command(about = "Word-highlighted, speech-timed captions for short vertical videos")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/swipecap/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where word timestamps come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TimingSource {
    /// Whisper word timestamps, primed with the narration
    Whisper,
    /// Narration spread evenly over the audio duration
    Narration,
}

#[derive(Subcommand)]
enum Commands {
    /// Transcribe scene audio and write scene_{id}.json caption files
    Align {
        /// Scene script (overrides [paths] script)
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Timestamp source
        #[arg(long, value_enum, default_value = "whisper")]
        source: TimingSource,

        /// Whisper model size
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show the reconciled frame schedule and layout of a caption file
    Plan {
        /// Caption JSON file, or "-" for stdin
        captions: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Measure with the configured font instead of fixed-advance glyphs
        #[arg(long)]
        font: bool,
    },

    /// Render every caption file to scene_{id}.mp4
    Render {
        /// Seed for reproducible background motion
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Join rendered scenes into final_short.mp4
    Concat,

    /// Align, render and concat in one go
    Run {
        /// Scene script (overrides [paths] script)
        #[arg(short, long)]
        script: Option<PathBuf>,

        /// Timestamp source
        #[arg(long, value_enum, default_value = "whisper")]
        source: TimingSource,

        /// Seed for reproducible background motion
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Resolve the caption style and print it with any corrections
    Style {
        /// Override a style key, e.g. --set font_size=64 (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Align {
            script,
            source,
            model,
        } => {
            cmd::cmd_align(config, script, source, model).await?;
        }
        Commands::Plan {
            captions,
            json,
            font,
        } => {
            cmd::cmd_plan(&config, &captions, json, font)?;
        }
        Commands::Render { seed } => {
            cmd::cmd_render(config, seed).await?;
        }
        Commands::Concat => {
            cmd::cmd_concat(config).await?;
        }
        Commands::Run {
            script,
            source,
            seed,
        } => {
            cmd::cmd_run(config, script, source, seed).await?;
        }
        Commands::Style { overrides } => {
            cmd::cmd_style(&config, &overrides)?;
        }
    }

    Ok(())
}
