//! Sentinel-2 orbit coverage command line tool.
//!
//! Downloads ESA acquisition plans and Copernicus catalog indexes, and joins
//! relative orbits (ground tracks or acquisition segments) against the MGRS
//! tiling grid, writing GeoParquet.

mod commands;
mod fetch;
mod progress;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coverage::CoverageConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{JoinOutput, RunContext};
use fetch::Fetcher;

#[derive(Parser, Debug)]
#[command(name = "s2-orbits")]
#[command(about = "Sentinel-2 relative orbit coverage of the MGRS tiling grid")]
struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Worker threads for zone processing
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the current and archived acquisition plans
    FetchAcquisitions {
        /// Directory receiving the KML files
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Download the S2A and S2B catalog indexes
    FetchCatalog {
        /// Directory receiving the CSV files
        #[arg(long)]
        out_dir: PathBuf,
    },

    /// Join acquisition plan segments against the tiling grid
    JoinAcquisitions {
        /// Tiling grid KML
        #[arg(long)]
        grid: PathBuf,

        /// Output file, or output directory with --per-file
        #[arg(long)]
        out: PathBuf,

        /// Write one output per acquisition input
        #[arg(long)]
        per_file: bool,

        /// Existence filter JSON restricting the (tile, orbit) pairs
        #[arg(long)]
        filter: Option<PathBuf>,

        /// Acquisition plan KML, KMZ or ZIP files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Join buffered ground tracks against the tiling grid
    JoinOrbits {
        /// Tiling grid KML
        #[arg(long)]
        grid: PathBuf,

        /// Ground track KML
        #[arg(long)]
        tracks: PathBuf,

        /// Folder holding the tracks (default: every placemark)
        #[arg(long)]
        tracks_layer: Option<String>,

        /// Output GeoParquet file
        #[arg(long)]
        out: PathBuf,

        /// Existence filter JSON restricting the (tile, orbit) pairs
        #[arg(long)]
        filter: Option<PathBuf>,

        /// Attribute carrying the relative orbit number
        #[arg(long)]
        orbit_field: Option<String>,
    },

    /// Build an existence filter from catalog CSVs and print it as JSON
    ExistenceFilter {
        /// Records per processing chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Column holding the product identifier
        #[arg(long, default_value = "product_id")]
        product_column: String,

        /// Column holding the tile code
        #[arg(long, default_value = "mgrs_tile")]
        tile_column: String,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        /// Catalog CSV files (optionally gzipped)
        #[arg(required = true)]
        catalogs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs)?;

    let mut config = load_config(&cli)?;

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(cancel.clone());

    match cli.command {
        Command::FetchAcquisitions { out_dir } => {
            let fetcher = Fetcher::new(!cli.json_logs, cancel.clone())?;
            let files = fetcher.fetch_acquisitions(&out_dir).await?;
            info!(files = files.len(), dir = %out_dir.display(), "Acquisition plans downloaded");
        }
        Command::FetchCatalog { out_dir } => {
            let fetcher = Fetcher::new(!cli.json_logs, cancel.clone())?;
            let files = fetcher.fetch_catalog(&out_dir).await?;
            info!(files = files.len(), dir = %out_dir.display(), "Catalog indexes downloaded");
        }
        Command::JoinAcquisitions {
            grid,
            out,
            per_file,
            filter,
            inputs,
        } => {
            let ctx = RunContext::new(config, cancel, !cli.json_logs);
            let outputs = tokio::task::spawn_blocking(move || {
                commands::join_acquisitions(&ctx, &grid, &inputs, &out, per_file, filter.as_deref())
            })
            .await
            .context("join worker panicked")??;
            report(&outputs)?;
        }
        Command::JoinOrbits {
            grid,
            tracks,
            tracks_layer,
            out,
            filter,
            orbit_field,
        } => {
            if let Some(field) = orbit_field {
                config.orbit_field = field;
            }
            let ctx = RunContext::new(config, cancel, !cli.json_logs);
            let output = tokio::task::spawn_blocking(move || {
                commands::join_orbits(
                    &ctx,
                    &grid,
                    &tracks,
                    tracks_layer.as_deref(),
                    &out,
                    filter.as_deref(),
                )
            })
            .await
            .context("join worker panicked")??;
            report(std::slice::from_ref(&output))?;
        }
        Command::ExistenceFilter {
            chunk_size,
            product_column,
            tile_column,
            pretty,
            catalogs,
        } => {
            if let Some(size) = chunk_size {
                config.catalog_chunk_size = size;
            }
            config.validate()?;
            let ctx = RunContext::new(config, cancel, !cli.json_logs);
            let filter = tokio::task::spawn_blocking(move || {
                commands::build_existence_filter(&ctx, &catalogs, &product_column, &tile_column)
            })
            .await
            .context("catalog worker panicked")??;

            let json = if pretty {
                filter.to_json_pretty()?
            } else {
                filter.to_json_string()?
            };
            println!("{}", json);
        }
    }

    Ok(())
}

/// Install the global tracing subscriber, writing to stderr.
fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.to_lowercase()))
        .with_context(|| format!("invalid log level '{}'", log_level))?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

/// Defaults, then the YAML file, then environment, then global flags.
fn load_config(cli: &Cli) -> Result<CoverageConfig> {
    let mut config = match &cli.config {
        Some(path) => CoverageConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => CoverageConfig::default(),
    };
    config.apply_env();

    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }
    config.validate()?;

    info!(
        workers = ?config.workers,
        skip_zones = ?config.skip_zones,
        chunk_size = config.catalog_chunk_size,
        "Loaded configuration"
    );
    Ok(config)
}

/// Raise the cancel flag on Ctrl-C; workers stop before their next zone or chunk.
fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            cancel.store(true, Ordering::SeqCst);
        }
    });
}

fn report(outputs: &[JoinOutput]) -> Result<()> {
    let mut stderr = std::io::stderr().lock();
    for output in outputs {
        commands::write_summary(output, &mut stderr).context("writing run summary")?;
    }
    Ok(())
}
