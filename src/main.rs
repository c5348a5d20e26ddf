use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use sdls::config::{CONFIG_FILE, SdlsConfig};
use sdls::output::OutputLayout;
use sdls::pipeline::{self, Pipeline, RunReport};
use sdls::telemetry::{self, LogFormat};
use sdls_core::Category;

/// Normalize and merge partial JSON mod data
///
/// Mods ship partial documents that only name the fields they change. sdls
/// fills every missing field from the canonical defaults ("molds") and
/// writes complete documents the game can load.
///
/// INPUTS:
///
///   <addon_dir>/<mod>/<category>.sdls        (preferred)
///   <addon_dir>/<mod>/<category>SDLS.json
///
/// OUTPUTS:
///
///   <output_dir>/addon/<mod>/<category>.json         normalize mode
///   <output_dir>/addon/SDLS_MERGED/<category>.json   merge mode
///
/// Set SDLS_LOG to control verbosity (e.g. SDLS_LOG=debug).
#[derive(Parser)]
#[command(name = "sdls")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(after_help = "See 'sdls <command> --help' for more information on a specific command.")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "SDLS_CONFIG", default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every mod document
    ///
    /// Normalizes each mod's documents, or with merge mode folds all mods into
    /// one merged document per category and logs conflicting overwrites.
    Run {
        /// Force merge mode on
        #[arg(long, conflicts_with = "no_merge")]
        merge: bool,

        /// Force merge mode off
        #[arg(long)]
        no_merge: bool,
    },

    /// Normalize a single document and print it to stdout
    Normalize {
        /// Category path, e.g. entities/qualities
        category: String,

        /// Document to normalize
        file: PathBuf,
    },

    /// Print the effective configuration as JSON
    Config,

    /// Remove every output recorded by the last run
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = SdlsConfig::load(&cli.config)
        .map_err(sdls::SdlsError::from)
        .context("loading configuration")?;
    telemetry::init(cli.log_format, config.run.debug_timing);

    match cli.command {
        Commands::Run { merge, no_merge } => {
            if merge {
                config.merge.enabled = true;
            } else if no_merge {
                config.merge.enabled = false;
            }
            let report = run(config)?;
            print!("{report}");
            Ok(())
        }
        Commands::Normalize { category, file } => {
            let pipeline = Pipeline::new(config)?;
            let text = pipeline.normalize_file(&Category::new(category), &file)?;
            println!("{text}");
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Clean => {
            let removal = pipeline::clean(&OutputLayout::new(&config.paths.output_dir))?;
            println!("removed {} file(s)", removal.removed.len());
            for (path, error) in &removal.failed {
                eprintln!("could not remove {}: {error}", path.display());
            }
            Ok(())
        }
    }
}

fn run(config: SdlsConfig) -> Result<RunReport> {
    let fast_load = config.run.fast_load;
    let pipeline = Pipeline::new(config)?;
    if !fast_load {
        return Ok(pipeline.run()?);
    }

    let started = std::time::Instant::now();
    let mut handle = pipeline.spawn();
    while !handle.wait_timeout(Duration::from_secs(1)) {
        tracing::info!(elapsed_s = started.elapsed().as_secs(), "still processing");
    }
    Ok(handle.wait()?)
}
