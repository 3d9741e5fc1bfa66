//! Tile preview CLI.
//!
//! Renders a georaster over a zoom range and writes the tiles as PNG.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use raster_common::BoundingBox;
use tile_preview::{run, PreviewConfig, ProjectionKind};

#[derive(Parser, Debug)]
#[command(name = "tile-preview")]
#[command(about = "Render georaster tiles to PNG files")]
struct Args {
    /// Raster summary JSON (dimensions, geo-transform, statistics, band values)
    #[arg(short, long, env = "GEORASTER_SUMMARY")]
    raster: PathBuf,

    /// Layer options JSON
    #[arg(short, long, env = "GEORASTER_OPTIONS")]
    options: Option<PathBuf>,

    /// Lowest zoom level to render
    #[arg(long, default_value = "0")]
    min_zoom: u32,

    /// Highest zoom level to render
    #[arg(long, default_value = "3")]
    max_zoom: u32,

    /// Output directory for {z}/{x}/{y}.png tiles
    #[arg(long, default_value = "tiles", env = "TILE_OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Map projection
    #[arg(long, value_enum, default_value = "web-mercator")]
    projection: ProjectionKind,

    /// Only render tiles over this box (minx,miny,maxx,maxy)
    #[arg(long)]
    bbox: Option<String>,

    /// Read the raster through windowed fetches
    #[arg(long)]
    windowed: bool,

    /// Maximum number of tiles to render
    #[arg(long, default_value = "1000")]
    max_tiles: usize,

    /// Number of tiles rendered concurrently
    #[arg(short, long, default_value = "4")]
    concurrency: usize,

    /// Write tiles with nothing painted
    #[arg(long)]
    keep_empty: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder().with_max_level(level);
    if args.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args)?;

    if args.min_zoom > args.max_zoom {
        bail!(
            "min zoom {} is above max zoom {}",
            args.min_zoom,
            args.max_zoom
        );
    }

    let region = args
        .bbox
        .as_deref()
        .map(BoundingBox::from_csv)
        .transpose()?;

    info!(raster = %args.raster.display(), "Starting tile preview");

    let config = PreviewConfig {
        raster_path: args.raster,
        options_path: args.options,
        min_zoom: args.min_zoom,
        max_zoom: args.max_zoom,
        output_dir: args.output_dir,
        projection: args.projection,
        region,
        windowed: args.windowed,
        max_tiles: args.max_tiles,
        concurrency: args.concurrency,
        keep_empty: args.keep_empty,
    };

    let summary = run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
