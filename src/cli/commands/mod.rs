//! CLI parser and command dispatch.

mod crawl;
mod merge;
mod reset;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "starscrape")]
#[command(about = "Resumable cast and popularity-rank crawler")]
#[command(version)]
pub struct Cli {
    /// Data directory for checkpoints and progress (overrides config file)
    #[arg(long, short = 'd', global = true, env = "STARSCRAPE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl (or resume crawling) a title table, then merge the results
    Crawl {
        /// CSV with tconst, director and cast columns
        input: PathBuf,
        /// Number of concurrent browser workers
        #[arg(short, long)]
        workers: Option<usize>,
        /// Titles per window
        #[arg(long)]
        window_size: Option<usize>,
        /// Leave window checkpoints unmerged
        #[arg(long)]
        no_merge: bool,
        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Merge window checkpoints into the output table once the crawl is done
    Merge {
        /// Merge even though the crawl has rows outstanding
        #[arg(long)]
        force: bool,
    },

    /// Show crawl progress and pending window checkpoints
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the progress record and window checkpoints
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data_dir,
    };
    let (mut settings, _config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Crawl {
            input,
            workers,
            window_size,
            no_merge,
            headed,
        } => {
            if let Some(workers) = workers {
                settings.workers = workers;
            }
            if let Some(window_size) = window_size {
                settings.window_size = window_size;
            }
            if headed {
                settings.browser.headless = false;
            }
            crawl::cmd_crawl(&settings, &input, !no_merge).await
        }
        Commands::Merge { force } => merge::cmd_merge(&settings, force).await,
        Commands::Status { json } => status::cmd_status(&settings, json).await,
        Commands::Reset { yes } => reset::cmd_reset(&settings, yes).await,
    }
}
