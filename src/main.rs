//! `threadreel` CLI - Build narrated videos from discussion threads

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "threadreel")]
#[command(about = "Turn a discussion thread into a short narrated video")]
#[command(version)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the video for a thread
    Build {
        /// Thread JSON file (thread document or saved Reddit listing)
        thread: PathBuf,

        /// Settings file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for videos, overrides `paths.video_dir`
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for background and referral selection
        #[arg(long)]
        seed: Option<u64>,

        /// Write metadata and ledger row without rendering
        #[arg(long)]
        no_compile: bool,

        /// Publish after rendering
        #[arg(long)]
        upload: bool,
    },

    /// Print the timeline for a thread as JSON without rendering
    Plan {
        /// Thread JSON file
        thread: PathBuf,

        /// Settings file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for background selection
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show which comments pass the filter
    Filter {
        /// Thread JSON file
        thread: PathBuf,

        /// Settings file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the default settings as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Build {
            thread,
            config,
            output,
            seed,
            no_compile,
            upload,
        } => {
            cmd::build::cmd_build(&thread, config.as_deref(), output, seed, no_compile, upload)?;
        }
        Commands::Plan {
            thread,
            config,
            seed,
        } => {
            cmd::plan::cmd_plan(&thread, config.as_deref(), seed)?;
        }
        Commands::Filter { thread, config } => {
            cmd::filter::cmd_filter(&thread, config.as_deref())?;
        }
        Commands::Config => {
            cmd::config::cmd_config()?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
