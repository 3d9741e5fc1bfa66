//! Tile preview: renders a raster's tiles over a zoom range and writes
//! them as PNG files laid out as `{z}/{x}/{y}.png`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use futures::stream::{self, StreamExt};
use georaster_layer::{
    Equirectangular, GeoRaster, GeoRasterLayer, InMemorySource, LayerOptions, MapProjection,
    MetricsSnapshot, RasterSummary, WebMercator,
};
use raster_common::{BoundingBox, LatLng, TileCoord, TileSize};
use renderer::lock_surface;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Map projection the tiles are cut in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProjectionKind {
    WebMercator,
    Equirectangular,
}

impl ProjectionKind {
    pub fn build(&self) -> Arc<dyn MapProjection> {
        match self {
            ProjectionKind::WebMercator => Arc::new(WebMercator),
            ProjectionKind::Equirectangular => Arc::new(Equirectangular),
        }
    }
}

/// Everything a preview run needs.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub raster_path: PathBuf,
    pub options_path: Option<PathBuf>,
    pub min_zoom: u32,
    pub max_zoom: u32,
    pub output_dir: PathBuf,
    pub projection: ProjectionKind,
    /// Restrict rendering to this lon/lat box
    pub region: Option<BoundingBox>,
    /// Read the raster through windowed fetches instead of directly
    pub windowed: bool,
    pub max_tiles: usize,
    pub concurrency: usize,
    /// Also write tiles with nothing painted
    pub keep_empty: bool,
}

/// Outcome of a preview run.
#[derive(Debug, Clone, Serialize)]
pub struct PreviewSummary {
    pub tiles_requested: usize,
    pub tiles_written: usize,
    pub tiles_empty: usize,
    pub tiles_failed: usize,
    pub metrics: MetricsSnapshot,
}

/// Load a raster summary with resident values.
pub fn load_raster(path: &Path) -> Result<RasterSummary> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read raster summary {}", path.display()))?;
    let summary: RasterSummary = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse raster summary {}", path.display()))?;
    summary.validate()?;
    Ok(summary.with_computed_ranges())
}

/// Wrap a resident summary either directly or behind a windowed source.
pub fn build_raster(summary: RasterSummary, windowed: bool) -> Result<GeoRaster> {
    if !windowed {
        return Ok(GeoRaster::resident(summary));
    }
    let bands = summary.band_count();
    let source = InMemorySource::new(summary.clone())?;
    let remote = RasterSummary {
        number_of_bands: Some(bands),
        values: None,
        ..summary
    };
    Ok(GeoRaster::windowed(remote, Arc::new(source)))
}

/// Tiles at `zoom` whose pixel extent overlaps `bounds`, row by row.
///
/// Coordinates are produced lazily; high zooms over large bounds cover
/// billions of tiles.
pub fn tiles_for_bounds(
    projection: &dyn MapProjection,
    bounds: &BoundingBox,
    zoom: u32,
    tile_size: TileSize,
) -> impl Iterator<Item = TileCoord> {
    let a = projection.project(LatLng::new(bounds.north(), bounds.west()), zoom);
    let b = projection.project(LatLng::new(bounds.south(), bounds.east()), zoom);

    let range = |p: f64, q: f64, size: u32| {
        let size = size as f64;
        let lo = (p.min(q) / size).floor().max(0.0) as u32;
        let hi = ((p.max(q) / size).ceil() - 1.0).max(lo as f64) as u32;
        lo..=hi
    };

    let rows = range(a.y, b.y, tile_size.height);
    let cols = range(a.x, b.x, tile_size.width);
    rows.flat_map(move |y| cols.clone().map(move |x| TileCoord::new(zoom, x, y)))
}

/// Raster bounds, narrowed to `region` when one is given.
pub fn render_extent(raster: BoundingBox, region: Option<BoundingBox>) -> Option<BoundingBox> {
    match region {
        Some(region) => raster.intersection(&region),
        None => Some(raster),
    }
}

/// Render and write every tile in the configured zoom range.
pub async fn run(config: &PreviewConfig) -> Result<PreviewSummary> {
    let summary = load_raster(&config.raster_path)?;
    let options = match &config.options_path {
        Some(path) => LayerOptions::from_file(path)
            .with_context(|| format!("Failed to load layer options {}", path.display()))?,
        None => LayerOptions::default(),
    };

    let projection = config.projection.build();
    let raster = build_raster(summary, config.windowed)?;
    let layer = GeoRasterLayer::builder(raster, options)
        .projection(projection.clone())
        .try_build()
        .context("Failed to initialize layer")?;

    let tile_size = georaster_layer::TileProvider::tile_size(&layer);
    let mut coords: Vec<TileCoord> = match render_extent(layer.get_bounds(), config.region) {
        Some(bounds) => (config.min_zoom..=config.max_zoom)
            .flat_map(|zoom| tiles_for_bounds(projection.as_ref(), &bounds, zoom, tile_size))
            .take(config.max_tiles.saturating_add(1))
            .collect(),
        None => {
            warn!("Region does not overlap the raster, nothing to render");
            Vec::new()
        }
    };
    if coords.len() > config.max_tiles {
        warn!(limit = config.max_tiles, "Tile count exceeds limit, truncating");
        coords.truncate(config.max_tiles);
    }

    info!(
        tiles = coords.len(),
        min_zoom = config.min_zoom,
        max_zoom = config.max_zoom,
        output = %config.output_dir.display(),
        "Rendering tiles"
    );

    let tiles_requested = coords.len();
    let mut tiles_written = 0;
    let mut tiles_empty = 0;
    let mut tiles_failed = 0;

    let mut results = stream::iter(coords)
        .map(|coord| {
            let handle = layer.begin_tile(coord);
            async move { (coord, handle.finish().await) }
        })
        .buffer_unordered(config.concurrency.max(1));

    while let Some((coord, result)) = results.next().await {
        let (surface, report) = match result {
            Ok(done) => done,
            Err(e) => {
                warn!(tile = %coord.cache_key(), error = %e, "Tile failed");
                tiles_failed += 1;
                continue;
            }
        };

        if report.cells_painted == 0 && !config.keep_empty {
            debug!(tile = %coord.cache_key(), "Skipping empty tile");
            tiles_empty += 1;
            continue;
        }

        let png = lock_surface(&surface).to_png()?;
        let path = tile_path(&config.output_dir, coord);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tiles_written += 1;
    }

    let summary = PreviewSummary {
        tiles_requested,
        tiles_written,
        tiles_empty,
        tiles_failed,
        metrics: layer.metrics().snapshot().await,
    };

    tokio::fs::create_dir_all(&config.output_dir).await?;
    let report_path = config.output_dir.join("summary.json");
    tokio::fs::write(&report_path, serde_json::to_vec_pretty(&summary)?)
        .await
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    info!(
        written = tiles_written,
        empty = tiles_empty,
        failed = tiles_failed,
        "Preview complete"
    );

    Ok(summary)
}

/// `{dir}/{z}/{x}/{y}.png`
pub fn tile_path(dir: &Path, coord: TileCoord) -> PathBuf {
    dir.join(coord.z.to_string())
        .join(coord.x.to_string())
        .join(format!("{}.png", coord.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_tiles_web_mercator() {
        let world = BoundingBox::new(-180.0, -85.0, 180.0, 85.0);
        assert_eq!(tiles_for_bounds(&WebMercator, &world, 1, TileSize::default()).count(), 4);
    }

    #[test]
    fn test_small_bounds_single_tile() {
        let bounds = BoundingBox::new(10.0, 44.0, 10.5, 44.5);
        let tiles: Vec<_> = tiles_for_bounds(&WebMercator, &bounds, 6, TileSize::default()).collect();
        assert_eq!(tiles, vec![raster_common::tile::latlon_to_tile(44.2, 10.2, 6)]);
    }

    #[test]
    fn test_equirectangular_zoom_zero() {
        let world = BoundingBox::new(-180.0, -90.0, 180.0, 90.0);
        let tiles: Vec<_> = tiles_for_bounds(&Equirectangular, &world, 0, TileSize::default()).collect();
        assert_eq!(tiles, vec![TileCoord::new(0, 0, 0), TileCoord::new(0, 1, 0)]);
    }

    #[test]
    fn test_deep_zoom_tiles_are_lazy() {
        let world = BoundingBox::new(-180.0, -85.0, 180.0, 85.0);
        let first: Vec<_> = tiles_for_bounds(&WebMercator, &world, 24, TileSize::default())
            .take(3)
            .collect();
        assert_eq!(
            first,
            vec![
                TileCoord::new(24, 0, first[0].y),
                TileCoord::new(24, 1, first[0].y),
                TileCoord::new(24, 2, first[0].y),
            ]
        );
    }

    #[test]
    fn test_render_extent_clips_to_region() {
        let raster = BoundingBox::new(0.0, 40.0, 20.0, 50.0);
        assert_eq!(render_extent(raster, None), Some(raster));

        let region = BoundingBox::from_csv("10,45,30,60").unwrap();
        assert_eq!(
            render_extent(raster, Some(region)),
            Some(BoundingBox::new(10.0, 45.0, 20.0, 50.0))
        );

        let elsewhere = BoundingBox::new(100.0, -10.0, 110.0, 0.0);
        assert_eq!(render_extent(raster, Some(elsewhere)), None);
    }

    #[test]
    fn test_tile_path_layout() {
        let path = tile_path(Path::new("/tmp/out"), TileCoord::new(3, 4, 5));
        assert_eq!(path, PathBuf::from("/tmp/out/3/4/5.png"));
    }
}
