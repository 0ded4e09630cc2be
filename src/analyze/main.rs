//! One-shot storm-impact analysis against local files.
//!
//! Runs the same pipeline the server exposes, writing CSV to stdout or
//! a file. Useful for batch runs and for checking a jurisdiction's
//! dataset before deploying it.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use palmetto::config::Config;
use palmetto::models::output;
use palmetto::pipeline;

#[derive(Parser, Debug)]
#[command(name = "analyze")]
#[command(about = "Run the storm-impact parcel analysis once")]
struct Args {
    /// Storm boundary GeoJSON file
    #[arg(short, long)]
    boundary: PathBuf,

    /// Jurisdiction key (case-insensitive, e.g. a county name)
    #[arg(short, long)]
    county: String,

    /// Parcel dataset root (one subdirectory per jurisdiction)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Structure-year cutoff override (exclusive upper bound)
    #[arg(long)]
    cutoff_year: Option<i32>,

    /// Structure-year floor override (exclusive lower bound)
    #[arg(long)]
    min_year: Option<i32>,

    /// Output CSV file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(data_dir) = args.data_dir {
        config.global.data_dir = data_dir;
    }
    if let Some(cutoff_year) = args.cutoff_year {
        config.filter.cutoff_year = cutoff_year;
    }
    if let Some(min_year) = args.min_year {
        config.filter.min_year = Some(min_year);
    }

    info!("Boundary: {}", args.boundary.display());
    info!("Jurisdiction: {}", args.county);

    let rows = pipeline::analyze_path(&args.boundary, &args.county, &config)?;
    info!("{} eligible parcels", rows.len());

    let csv = output::write_csv(&rows)?;
    match &args.output {
        Some(path) => {
            fs::write(path, csv).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => print!("{csv}"),
    }

    Ok(())
}
