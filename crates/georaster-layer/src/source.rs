//! Raster providers for windowed reads.

use async_trait::async_trait;

use crate::error::{LayerError, Result};
use crate::summary::RasterSummary;

/// Inclusive raster pixel window, in raster index space.
///
/// Indices are signed: a tile overhanging the raster edge produces a window
/// reaching past row/column 0 or past the last row/column, and providers
/// decide what to return there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelWindow {
    pub min_col: i64,
    pub min_row: i64,
    pub max_col: i64,
    pub max_row: i64,
}

impl PixelWindow {
    pub fn new(min_col: i64, min_row: i64, max_col: i64, max_row: i64) -> Self {
        Self {
            min_col,
            min_row,
            max_col,
            max_row,
        }
    }

    /// Number of raster columns covered (inclusive).
    pub fn cols(&self) -> i64 {
        self.max_col - self.min_col + 1
    }

    /// Number of raster rows covered (inclusive).
    pub fn rows(&self) -> i64 {
        self.max_row - self.min_row + 1
    }
}

/// Asynchronous access to raster values that are not resident in memory.
///
/// `get_values` returns one flat, row-major sequence per band, each of
/// length `out_cols * out_rows`, resampling the window to that size.
#[async_trait]
pub trait RasterSource: Send + Sync {
    async fn get_values(
        &self,
        window: PixelWindow,
        out_cols: usize,
        out_rows: usize,
    ) -> Result<Vec<Vec<f64>>>;
}

/// Serves windowed reads from a resident raster by nearest-neighbour
/// resampling. Cells outside the raster read as the no-data value (NaN when
/// the raster has none).
#[derive(Debug, Clone)]
pub struct InMemorySource {
    summary: RasterSummary,
}

impl InMemorySource {
    pub fn new(summary: RasterSummary) -> Result<Self> {
        if !summary.is_resident() {
            return Err(LayerError::initialization(
                "in-memory source needs resident band values",
            ));
        }
        summary.validate()?;
        Ok(Self { summary })
    }

    fn fill_value(&self) -> f64 {
        self.summary.no_data_value.unwrap_or(f64::NAN)
    }

    /// Index of the source pixel whose span holds the centre of output
    /// cell `i` of `n` over `span` source pixels starting at `start`.
    fn nearest(start: i64, span: i64, i: usize, n: usize) -> i64 {
        start + ((i as f64 + 0.5) * span as f64 / n as f64).floor() as i64
    }
}

#[async_trait]
impl RasterSource for InMemorySource {
    async fn get_values(
        &self,
        window: PixelWindow,
        out_cols: usize,
        out_rows: usize,
    ) -> Result<Vec<Vec<f64>>> {
        if window.cols() <= 0 || window.rows() <= 0 {
            return Err(LayerError::provider_fetch(format!(
                "empty window {:?}",
                window
            )));
        }

        let bands = self.summary.values.as_deref().unwrap_or(&[]);
        let fill = self.fill_value();

        let out = bands
            .iter()
            .map(|band| {
                let mut flat = Vec::with_capacity(out_cols * out_rows);
                for r in 0..out_rows {
                    let row = Self::nearest(window.min_row, window.rows(), r, out_rows);
                    for c in 0..out_cols {
                        let col = Self::nearest(window.min_col, window.cols(), c, out_cols);
                        let value = if row < 0 || col < 0 {
                            None
                        } else {
                            band.get(row as usize, col as usize)
                        };
                        flat.push(value.unwrap_or(fill));
                    }
                }
                flat
            })
            .collect();

        Ok(out)
    }
}
