//! Per-tile sampling grids and raster value lookup.
//!
//! A tile is divided into `rects_across x rects_down` cells, capped by the
//! configured resolution and by the number of raster pixels the tile spans.
//! Each cell is sampled once at its centre, either straight from resident
//! band data or from a single windowed read covering the whole tile.

use std::sync::Arc;

use raster_common::{BoundingBox, LatLng, TileCoord, TileSize};
use renderer::PixelRect;
use tracing::debug;

use crate::error::{LayerError, Result};
use crate::projection::{geo_to_raster_index, map_pixel_to_geo, MapProjection, RasterIndex};
use crate::source::{PixelWindow, RasterSource};
use crate::summary::{BandGrid, RasterSummary};

/// Sampling grid for one tile render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingGrid {
    pub rects_across: usize,
    pub rects_down: usize,
    /// Cell size in tile pixels
    pub cell_width: f64,
    pub cell_height: f64,
    /// Cell size in geographic units
    pub cell_geo_width: f64,
    pub cell_geo_height: f64,
}

/// Cells along one axis: never more than the raster pixels covered, never
/// more than the cap, never fewer than one.
fn axis_cells(resolution: usize, geo_extent: f64, pixel_size: f64) -> usize {
    let covered = (geo_extent / pixel_size).ceil();
    let covered = if covered.is_nan() { 1.0 } else { covered.max(1.0) };
    resolution.min(covered as usize).max(1)
}

impl SamplingGrid {
    pub fn compute(
        tile_bounds: &BoundingBox,
        tile_size: TileSize,
        resolution: usize,
        pixel_width: f64,
        pixel_height: f64,
    ) -> Self {
        let rects_across = axis_cells(resolution, tile_bounds.width(), pixel_width);
        let rects_down = axis_cells(resolution, tile_bounds.height(), pixel_height);
        Self {
            rects_across,
            rects_down,
            cell_width: tile_size.width as f64 / rects_across as f64,
            cell_height: tile_size.height as f64 / rects_down as f64,
            cell_geo_width: tile_bounds.width() / rects_across as f64,
            cell_geo_height: tile_bounds.height() / rects_down as f64,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.rects_across * self.rects_down
    }

    /// Tile-pixel rectangle for cell (`h`, `w`): offsets rounded, sizes
    /// rounded up so neighbouring cells leave no gaps.
    pub fn cell_rect(&self, h: usize, w: usize) -> PixelRect {
        PixelRect::new(
            (w as f64 * self.cell_width).round() as u32,
            (h as f64 * self.cell_height).round() as u32,
            self.cell_width.ceil() as u32,
            self.cell_height.ceil() as u32,
        )
    }

    /// Geographic centre and raster index of every cell, row-major.
    pub fn locate_cells(
        &self,
        coord: TileCoord,
        tile_size: TileSize,
        projection: &dyn MapProjection,
        summary: &RasterSummary,
    ) -> Vec<CellLocation> {
        let nw = coord.nw_pixel(tile_size);
        let bounds = summary.bounds();
        let mut cells = Vec::with_capacity(self.cell_count());

        for h in 0..self.rects_down {
            for w in 0..self.rects_across {
                let center = nw.offset(
                    (w as f64 + 0.5) * self.cell_width,
                    (h as f64 + 0.5) * self.cell_height,
                );
                let latlng = map_pixel_to_geo(center, coord.z, projection);
                cells.push(CellLocation {
                    row: h,
                    col: w,
                    latlng,
                    index: geo_to_raster_index(latlng, summary),
                    in_bounds: bounds.contains_point(latlng.lng, latlng.lat),
                });
            }
        }
        cells
    }
}

/// Where one grid cell lands on the raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLocation {
    /// Grid position
    pub row: usize,
    pub col: usize,
    pub latlng: LatLng,
    /// Unclamped raster index of the centre
    pub index: RasterIndex,
    /// Centre lies within the raster's geographic bounds
    pub in_bounds: bool,
}

/// How a layer reaches raster values, fixed at construction.
#[derive(Clone)]
pub enum SamplingMode {
    Direct,
    Windowed(Arc<dyn RasterSource>),
}

impl SamplingMode {
    pub fn name(&self) -> &'static str {
        match self {
            SamplingMode::Direct => "direct",
            SamplingMode::Windowed(_) => "windowed",
        }
    }
}

impl std::fmt::Debug for SamplingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Values available to one tile render.
#[derive(Debug, Clone)]
pub enum TileValues {
    /// Read per cell from resident band data
    Direct(Arc<RasterSummary>),
    /// One `rects_down x rects_across` grid per band from a windowed read
    Windowed(Vec<BandGrid>),
}

impl TileValues {
    /// Per-band values for a cell, `None` when nothing can be read there.
    pub fn values_at(&self, cell: &CellLocation) -> Option<Vec<f64>> {
        match self {
            TileValues::Direct(summary) => {
                let (row, col) = cell.index.clamp_to(summary.width, summary.height);
                summary.values_at(row, col)
            }
            TileValues::Windowed(bands) => bands
                .iter()
                .map(|band| band.get(cell.row, cell.col))
                .collect(),
        }
    }
}

/// Raster-index window spanned by a tile: min and max over the indices of
/// the four corner cells, so projections that flip an axis still give an
/// ordered window.
pub fn tile_window(cells: &[CellLocation], grid: &SamplingGrid) -> Option<PixelWindow> {
    let across = grid.rects_across;
    let down = grid.rects_down;
    let corners = [
        cells.first()?,
        cells.get(across - 1)?,
        cells.get((down - 1) * across)?,
        cells.get(down * across - 1)?,
    ];

    let rows = corners.iter().map(|c| c.index.row);
    let cols = corners.iter().map(|c| c.index.col);
    Some(PixelWindow::new(
        cols.clone().min()?,
        rows.clone().min()?,
        cols.max()?,
        rows.max()?,
    ))
}

/// Resolves sample values for a tile in the layer's sampling mode.
#[derive(Debug, Clone)]
pub struct RegionSampler {
    summary: Arc<RasterSummary>,
    mode: SamplingMode,
}

impl RegionSampler {
    pub fn new(summary: Arc<RasterSummary>, mode: SamplingMode) -> Self {
        Self { summary, mode }
    }

    pub fn mode(&self) -> &SamplingMode {
        &self.mode
    }

    /// Whether `sample` suspends on a provider read.
    pub fn fetches(&self) -> bool {
        matches!(self.mode, SamplingMode::Windowed(_))
    }

    /// Fetch or borrow the values for a located grid. Windowed mode issues
    /// exactly one provider read.
    pub async fn sample(&self, grid: &SamplingGrid, cells: &[CellLocation]) -> Result<TileValues> {
        let source = match &self.mode {
            SamplingMode::Direct => return Ok(TileValues::Direct(self.summary.clone())),
            SamplingMode::Windowed(source) => source,
        };

        let window = tile_window(cells, grid)
            .ok_or_else(|| LayerError::provider_fetch("sampling grid has no cells"))?;
        let across = grid.rects_across;
        let down = grid.rects_down;

        debug!(
            min_col = window.min_col,
            min_row = window.min_row,
            max_col = window.max_col,
            max_row = window.max_row,
            across,
            down,
            "Fetching raster window"
        );

        let flat = source.get_values(window, across, down).await?;
        reshape(flat, across, down).map(TileValues::Windowed)
    }
}

/// Reshape flat row-major band sequences into `down x across` grids.
fn reshape(flat: Vec<Vec<f64>>, across: usize, down: usize) -> Result<Vec<BandGrid>> {
    flat.into_iter()
        .enumerate()
        .map(|(band, values)| {
            if values.len() != across * down {
                return Err(LayerError::provider_fetch(format!(
                    "band {} returned {} values, expected {}x{}",
                    band,
                    values.len(),
                    across,
                    down
                )));
            }
            BandGrid::new(across, down, values)
                .map_err(|e| LayerError::provider_fetch(e.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_capped_by_resolution() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let grid = SamplingGrid::compute(&bounds, TileSize::default(), 4, 0.01, 0.01);
        assert_eq!((grid.rects_across, grid.rects_down), (4, 4));
        assert_eq!(grid.cell_width, 64.0);
        assert_eq!(grid.cell_geo_width, 2.5);
    }

    #[test]
    fn test_grid_capped_by_raster_pixels() {
        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 0.5);
        let grid = SamplingGrid::compute(&bounds, TileSize::default(), 32, 0.3, 0.2);
        assert_eq!((grid.rects_across, grid.rects_down), (4, 3));
    }

    #[test]
    fn test_grid_never_empty() {
        let bounds = BoundingBox::new(0.0, 0.0, 0.0, 0.0);
        let grid = SamplingGrid::compute(&bounds, TileSize::default(), 32, 1.0, 1.0);
        assert_eq!((grid.rects_across, grid.rects_down), (1, 1));

        let grid = SamplingGrid::compute(&bounds, TileSize::default(), 0, 1.0, 1.0);
        assert_eq!(grid.cell_count(), 1);
    }

    #[test]
    fn test_cell_rects_cover_tile() {
        let bounds = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let grid = SamplingGrid::compute(&bounds, TileSize::default(), 3, 0.01, 0.01);
        let first = grid.cell_rect(0, 0);
        let second = grid.cell_rect(0, 1);
        let last = grid.cell_rect(2, 2);

        assert_eq!(first, PixelRect::new(0, 0, 86, 86));
        assert_eq!(second.x, 85);
        assert!(first.x + first.width >= second.x);
        assert!(last.x + last.width >= 256);
    }

    #[test]
    fn test_reshape_rejects_wrong_length() {
        assert!(matches!(
            reshape(vec![vec![1.0; 5]], 2, 3),
            Err(LayerError::ProviderFetch(_))
        ));
        let bands = reshape(vec![(0..6).map(f64::from).collect()], 2, 3).unwrap();
        assert_eq!(bands[0].get(2, 1), Some(5.0));
    }
}
