//! Tile rendering: bounds, grid, sampling, colour and paint for one tile.

use std::sync::Arc;
use std::time::Duration;

use raster_common::{Rgba, TileCoord, TileSize};
use renderer::{lock_surface, resolve_color, ColorContext, ColorStrategy, PixelRect, SharedSurface, Surface};
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::metrics::{RenderMetrics, Timer};
use crate::projection::{tile_to_geo_bounds, MapProjection};
use crate::sampler::{RegionSampler, SamplingGrid};
use crate::summary::RasterSummary;

/// What a single tile render did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileReport {
    pub coord: TileCoord,
    pub rects_across: usize,
    pub rects_down: usize,
    /// Cells whose centre fell inside the raster
    pub cells_sampled: usize,
    /// Cells that produced a colour and were painted
    pub cells_painted: usize,
    /// Whether a provider read was issued
    pub fetched: bool,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }
}

impl TileReport {
    fn empty(coord: TileCoord) -> Self {
        Self {
            coord,
            rects_across: 0,
            rects_down: 0,
            cells_sampled: 0,
            cells_painted: 0,
            fetched: false,
            elapsed: Duration::ZERO,
        }
    }
}

/// Everything needed to fill one tile. Shared read-only between tile
/// tasks.
#[derive(Clone)]
pub struct TileRenderer {
    summary: Arc<RasterSummary>,
    sampler: RegionSampler,
    strategy: ColorStrategy,
    context: ColorContext,
    projection: Arc<dyn MapProjection>,
    tile_size: TileSize,
    resolution: usize,
    metrics: Arc<RenderMetrics>,
}

impl TileRenderer {
    pub fn new(
        summary: Arc<RasterSummary>,
        sampler: RegionSampler,
        strategy: ColorStrategy,
        projection: Arc<dyn MapProjection>,
        tile_size: TileSize,
        resolution: usize,
        metrics: Arc<RenderMetrics>,
    ) -> Self {
        let context = ColorContext::new(summary.no_data_value);
        Self {
            summary,
            sampler,
            strategy,
            context,
            projection,
            tile_size,
            resolution,
            metrics,
        }
    }

    pub fn strategy(&self) -> &ColorStrategy {
        &self.strategy
    }

    pub fn tile_size(&self) -> TileSize {
        self.tile_size
    }

    /// Sampling grid a render of `coord` would use.
    pub fn sampling_grid(&self, coord: TileCoord) -> SamplingGrid {
        let bounds = tile_to_geo_bounds(coord, self.tile_size, self.projection.as_ref());
        SamplingGrid::compute(
            &bounds,
            self.tile_size,
            self.resolution,
            self.summary.pixel_width,
            self.summary.pixel_height,
        )
    }

    /// Fill `surface` with the raster content of tile `coord`.
    ///
    /// The surface lock is only taken after sampling, so the provider read
    /// never holds it.
    pub async fn render<S: Surface>(
        &self,
        coord: TileCoord,
        surface: &SharedSurface<S>,
    ) -> Result<TileReport> {
        let timer = Timer::start();
        let tile_bounds = tile_to_geo_bounds(coord, self.tile_size, self.projection.as_ref());

        if !tile_bounds.intersects(&self.summary.bounds()) {
            self.metrics.record_tile_skipped();
            debug!(z = coord.z, x = coord.x, y = coord.y, "Tile outside raster, skipping");
            let mut report = TileReport::empty(coord);
            report.elapsed = Duration::from_micros(timer.elapsed_us());
            return Ok(report);
        }

        let grid = SamplingGrid::compute(
            &tile_bounds,
            self.tile_size,
            self.resolution,
            self.summary.pixel_width,
            self.summary.pixel_height,
        );
        let cells = grid.locate_cells(coord, self.tile_size, self.projection.as_ref(), &self.summary);
        let cells_sampled = cells.iter().filter(|c| c.in_bounds).count();

        let mut fetched = false;
        let mut fills: Vec<(PixelRect, Rgba)> = Vec::new();

        if cells_sampled > 0 {
            fetched = self.sampler.fetches();
            let fetch_timer = Timer::start();
            let sampled = self.sampler.sample(&grid, &cells).await;
            if fetched {
                self.metrics
                    .record_fetch(fetch_timer.elapsed_us(), sampled.is_ok())
                    .await;
            }
            let values = sampled?;

            for cell in cells.iter().filter(|c| c.in_bounds) {
                let color = values
                    .values_at(cell)
                    .and_then(|v| resolve_color(&v, &self.strategy, &self.context));
                if let Some(color) = color {
                    fills.push((grid.cell_rect(cell.row, cell.col), color));
                }
            }
        }

        if !fills.is_empty() {
            let mut canvas = lock_surface(surface);
            for (rect, color) in &fills {
                canvas.fill_rect(*rect, *color);
            }
        }

        let elapsed_us = timer.elapsed_us();
        self.metrics
            .record_render(elapsed_us, cells_sampled as u64, fills.len() as u64)
            .await;

        debug!(
            z = coord.z,
            x = coord.x,
            y = coord.y,
            rects_across = grid.rects_across,
            rects_down = grid.rects_down,
            sampled = cells_sampled,
            painted = fills.len(),
            fetched,
            elapsed_ms = elapsed_us as f64 / 1000.0,
            "Rendered tile"
        );

        Ok(TileReport {
            coord,
            rects_across: grid.rects_across,
            rects_down: grid.rects_down,
            cells_sampled,
            cells_painted: fills.len(),
            fetched,
            elapsed: Duration::from_micros(elapsed_us),
        })
    }
}

impl std::fmt::Debug for TileRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileRenderer")
            .field("strategy", &self.strategy)
            .field("mode", self.sampler.mode())
            .field("tile_size", &self.tile_size)
            .field("resolution", &self.resolution)
            .finish_non_exhaustive()
    }
}
