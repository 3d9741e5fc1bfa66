//! Raster metadata and resident band data.

use std::fmt;
use std::sync::Arc;

use raster_common::BoundingBox;
use serde::Deserialize;

use crate::error::{LayerError, Result};
use crate::source::RasterSource;

/// One band as a row-major 2D grid of samples.
///
/// Deserializes from a JSON array of rows (`[[1, 2], [3, 4]]`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>")]
pub struct BandGrid {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl BandGrid {
    /// Wrap a flat row-major buffer; `data.len()` must equal `width * height`.
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != width * height {
            return Err(LayerError::initialization(format!(
                "band has {} samples, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return Err(LayerError::initialization("band rows have differing lengths"));
        }
        Self::new(width, height, rows.into_iter().flatten().collect())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.data.get(row * self.width + col).copied()
    }
}

impl TryFrom<Vec<Vec<f64>>> for BandGrid {
    type Error = LayerError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_rows(rows)
    }
}

/// Immutable description of a raster, supplied at layer construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RasterSummary {
    /// Pixel dimensions
    pub width: usize,
    pub height: usize,

    /// Geographic units per pixel
    pub pixel_width: f64,
    pub pixel_height: f64,

    /// Geographic bounds
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,

    /// Band count when values are not resident
    #[serde(default)]
    pub number_of_bands: Option<usize>,

    /// Per-band statistics; empty when unknown
    #[serde(default)]
    pub mins: Vec<f64>,
    #[serde(default)]
    pub maxs: Vec<f64>,
    #[serde(default)]
    pub ranges: Vec<f64>,

    #[serde(default)]
    pub no_data_value: Option<f64>,

    /// Fully resident band data; absent in windowed mode
    #[serde(default)]
    pub values: Option<Vec<BandGrid>>,
}

impl RasterSummary {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.xmin, self.ymin, self.xmax, self.ymax)
    }

    pub fn is_resident(&self) -> bool {
        self.values.is_some()
    }

    pub fn band_count(&self) -> usize {
        match &self.values {
            Some(bands) => bands.len(),
            None => self.number_of_bands.unwrap_or(self.mins.len()),
        }
    }

    pub fn band_min(&self, band: usize) -> Option<f64> {
        self.mins.get(band).copied()
    }

    pub fn band_range(&self, band: usize) -> Option<f64> {
        self.ranges.get(band).copied()
    }

    /// Fill `ranges` from `maxs - mins` when it was not supplied.
    pub fn with_computed_ranges(mut self) -> Self {
        if self.ranges.is_empty() && !self.mins.is_empty() && self.mins.len() == self.maxs.len() {
            self.ranges = self
                .mins
                .iter()
                .zip(&self.maxs)
                .map(|(min, max)| max - min)
                .collect();
        }
        self
    }

    /// Check dimensions, geo-transform and band shapes.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LayerError::initialization(format!(
                "raster dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }

        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.pixel_width) || !positive(self.pixel_height) {
            return Err(LayerError::initialization(format!(
                "pixel size must be positive, got {}x{}",
                self.pixel_width, self.pixel_height
            )));
        }

        if !self.bounds().is_valid() {
            return Err(LayerError::initialization(format!(
                "invalid raster bounds {:?}",
                self.bounds()
            )));
        }

        if self.mins.len() != self.maxs.len() && !self.maxs.is_empty() {
            return Err(LayerError::initialization(
                "mins and maxs must have the same length",
            ));
        }

        if let Some(bands) = &self.values {
            if bands.is_empty() {
                return Err(LayerError::initialization("resident raster has no bands"));
            }
            for (i, band) in bands.iter().enumerate() {
                if band.width() != self.width || band.height() != self.height {
                    return Err(LayerError::initialization(format!(
                        "band {} is {}x{}, raster is {}x{}",
                        i,
                        band.width(),
                        band.height(),
                        self.width,
                        self.height
                    )));
                }
            }
        }

        Ok(())
    }

    /// Values of every band at a raster pixel, when resident.
    pub fn values_at(&self, row: usize, col: usize) -> Option<Vec<f64>> {
        self.values
            .as_ref()?
            .iter()
            .map(|band| band.get(row, col))
            .collect()
    }
}

/// A raster as handed to the layer: its summary plus, when values are not
/// resident, the provider used for windowed reads.
#[derive(Clone)]
pub struct GeoRaster {
    pub summary: RasterSummary,
    pub source: Option<Arc<dyn RasterSource>>,
}

impl GeoRaster {
    /// A raster whose values are held in memory.
    pub fn resident(summary: RasterSummary) -> Self {
        Self {
            summary,
            source: None,
        }
    }

    /// A raster read on demand through `source`.
    pub fn windowed(summary: RasterSummary, source: Arc<dyn RasterSource>) -> Self {
        Self {
            summary,
            source: Some(source),
        }
    }
}

impl fmt::Debug for GeoRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoRaster")
            .field("summary", &self.summary)
            .field("windowed", &self.source.is_some())
            .finish()
    }
}
