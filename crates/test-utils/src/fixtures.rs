//! Common test fixtures: rasters, projections and mock raster sources.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use georaster_layer::{
    BandGrid, GeoRaster, LayerError, MapProjection, PixelWindow, RasterSource, RasterSummary,
    Result,
};
use raster_common::{LatLng, PixelPoint};

// ============================================================================
// Rasters
// ============================================================================

/// Builds test rasters. Defaults: origin (0, 0) at the north-west corner,
/// one degree pixels, no bands, no statistics.
#[derive(Debug, Clone)]
pub struct RasterBuilder {
    width: usize,
    height: usize,
    xmin: f64,
    ymax: f64,
    pixel_width: f64,
    pixel_height: f64,
    no_data: Option<f64>,
    bands: Vec<Vec<f64>>,
    stats: Option<(Vec<f64>, Vec<f64>)>,
    band_count: Option<usize>,
}

impl RasterBuilder {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            xmin: 0.0,
            ymax: 0.0,
            pixel_width: 1.0,
            pixel_height: 1.0,
            no_data: None,
            bands: Vec::new(),
            stats: None,
            band_count: None,
        }
    }

    /// North-west corner of the raster.
    pub fn origin(mut self, xmin: f64, ymax: f64) -> Self {
        self.xmin = xmin;
        self.ymax = ymax;
        self
    }

    pub fn pixel_size(mut self, pixel_width: f64, pixel_height: f64) -> Self {
        self.pixel_width = pixel_width;
        self.pixel_height = pixel_height;
        self
    }

    pub fn no_data(mut self, value: f64) -> Self {
        self.no_data = Some(value);
        self
    }

    /// Append a band (row-major, `width * height` values).
    pub fn band(mut self, data: Vec<f64>) -> Self {
        self.bands.push(data);
        self
    }

    /// Band count reported by a windowed summary that carries no band data.
    pub fn band_count(mut self, bands: usize) -> Self {
        self.band_count = Some(bands);
        self
    }

    /// Per-band statistics; ranges are derived from them.
    pub fn stats(mut self, mins: Vec<f64>, maxs: Vec<f64>) -> Self {
        self.stats = Some((mins, maxs));
        self
    }

    pub fn xmax(&self) -> f64 {
        self.xmin + self.width as f64 * self.pixel_width
    }

    pub fn ymin(&self) -> f64 {
        self.ymax - self.height as f64 * self.pixel_height
    }

    /// Summary with the bands resident.
    pub fn summary(&self) -> RasterSummary {
        let values = self
            .bands
            .iter()
            .map(|data| {
                BandGrid::new(self.width, self.height, data.clone())
                    .expect("band length must match raster size")
            })
            .collect();
        RasterSummary {
            values: Some(values),
            ..self.bare_summary()
        }
    }

    /// Summary with no values, as a remote raster would describe itself.
    pub fn bare_summary(&self) -> RasterSummary {
        let (mins, maxs) = self.stats.clone().unwrap_or_default();
        RasterSummary {
            width: self.width,
            height: self.height,
            pixel_width: self.pixel_width,
            pixel_height: self.pixel_height,
            xmin: self.xmin,
            ymin: self.ymin(),
            xmax: self.xmax(),
            ymax: self.ymax,
            number_of_bands: Some(self.band_count.unwrap_or(self.bands.len().max(1))),
            mins,
            maxs,
            ranges: Vec::new(),
            no_data_value: self.no_data,
            values: None,
        }
        .with_computed_ranges()
    }

    pub fn resident(&self) -> GeoRaster {
        GeoRaster::resident(self.summary())
    }

    /// Windowed raster reading through `source`.
    pub fn windowed(&self, source: Arc<dyn RasterSource>) -> GeoRaster {
        GeoRaster::windowed(self.bare_summary(), source)
    }
}

// ============================================================================
// Projections
// ============================================================================

/// Linear test projection: a fixed number of degrees per map pixel at every
/// zoom. North-up maps pixel y downward to decreasing latitude; the inverted
/// variant maps it to increasing latitude, flipping the row order of the
/// tile's corner cells.
#[derive(Debug, Clone, Copy)]
pub struct LinearProjection {
    pub degrees_per_pixel: f64,
    pub invert_y: bool,
}

impl LinearProjection {
    pub fn north_up(degrees_per_pixel: f64) -> Self {
        Self {
            degrees_per_pixel,
            invert_y: false,
        }
    }

    pub fn inverted(degrees_per_pixel: f64) -> Self {
        Self {
            degrees_per_pixel,
            invert_y: true,
        }
    }

    fn y_sign(&self) -> f64 {
        if self.invert_y {
            1.0
        } else {
            -1.0
        }
    }
}

impl MapProjection for LinearProjection {
    fn project(&self, latlng: LatLng, _zoom: u32) -> PixelPoint {
        PixelPoint::new(
            latlng.lng / self.degrees_per_pixel,
            latlng.lat / (self.y_sign() * self.degrees_per_pixel),
        )
    }

    fn unproject(&self, point: PixelPoint, _zoom: u32) -> LatLng {
        LatLng::new(
            self.y_sign() * point.y * self.degrees_per_pixel,
            point.x * self.degrees_per_pixel,
        )
    }
}

// ============================================================================
// Raster sources
// ============================================================================

/// Arguments of one windowed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchCall {
    pub window: PixelWindow,
    pub out_cols: usize,
    pub out_rows: usize,
}

impl FetchCall {
    /// `(min_col, min_row, max_col, max_row, out_cols, out_rows)`
    pub fn as_tuple(&self) -> (i64, i64, i64, i64, usize, usize) {
        (
            self.window.min_col,
            self.window.min_row,
            self.window.max_col,
            self.window.max_row,
            self.out_cols,
            self.out_rows,
        )
    }
}

#[derive(Debug, Clone)]
enum Response {
    /// One constant value per band
    Constant(Vec<f64>),
    /// Each output cell set to `row * out_cols + col`
    Ordinal { bands: usize },
    Fail(String),
    /// One value short of the requested shape
    Short,
    Panic,
}

/// Raster source that records every read and answers from a canned
/// response.
#[derive(Debug)]
pub struct RecordingSource {
    calls: Mutex<Vec<FetchCall>>,
    response: Response,
    delay: Option<Duration>,
}

impl RecordingSource {
    fn with_response(response: Response) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response,
            delay: None,
        }
    }

    /// Every output cell of band `i` is `values[i]`.
    pub fn constant(values: Vec<f64>) -> Self {
        Self::with_response(Response::Constant(values))
    }

    /// Output cell (r, c) of every band is `r * out_cols + c`.
    pub fn ordinal(bands: usize) -> Self {
        Self::with_response(Response::Ordinal { bands })
    }

    pub fn failing(message: &str) -> Self {
        Self::with_response(Response::Fail(message.to_string()))
    }

    /// Returns one value fewer than requested.
    pub fn short() -> Self {
        Self::with_response(Response::Short)
    }

    pub fn panicking() -> Self {
        Self::with_response(Response::Panic)
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl RasterSource for RecordingSource {
    async fn get_values(
        &self,
        window: PixelWindow,
        out_cols: usize,
        out_rows: usize,
    ) -> Result<Vec<Vec<f64>>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(FetchCall {
                window,
                out_cols,
                out_rows,
            });
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let n = out_cols * out_rows;
        match &self.response {
            Response::Constant(values) => Ok(values.iter().map(|v| vec![*v; n]).collect()),
            Response::Ordinal { bands } => {
                Ok(vec![(0..n).map(|i| i as f64).collect(); *bands])
            }
            Response::Fail(message) => Err(LayerError::provider_fetch(message.clone())),
            Response::Short => Ok(vec![vec![0.0; n.saturating_sub(1)]]),
            Response::Panic => panic!("raster source exploded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_bounds() {
        let b = RasterBuilder::new(10, 4).origin(-5.0, 2.0).pixel_size(0.5, 0.25);
        let s = b.bare_summary();
        assert_eq!((s.xmin, s.xmax), (-5.0, 0.0));
        assert_eq!((s.ymin, s.ymax), (1.0, 2.0));
        assert!(s.values.is_none());
    }

    #[test]
    fn test_linear_projection_orientation() {
        let p = LinearProjection::north_up(0.5);
        assert_eq!(p.unproject(PixelPoint::new(2.0, 4.0), 0), LatLng::new(-2.0, 1.0));
        let p = LinearProjection::inverted(0.5);
        assert_eq!(p.unproject(PixelPoint::new(2.0, 4.0), 0), LatLng::new(2.0, 1.0));
    }

    #[test]
    fn test_recording_source_records() {
        let source = RecordingSource::constant(vec![1.0, 2.0]);
        let out = tokio_test::block_on(source.get_values(PixelWindow::new(0, 0, 3, 3), 2, 2))
            .unwrap();
        assert_eq!(out, vec![vec![1.0; 4], vec![2.0; 4]]);
        assert_eq!(source.fetch_count(), 1);
        assert_eq!(source.calls()[0].as_tuple(), (0, 0, 3, 3, 2, 2));
    }
}
