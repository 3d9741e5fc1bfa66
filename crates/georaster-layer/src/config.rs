//! Layer options.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use raster_common::{ColorScaleSpec, Rgba, TileSize};
use renderer::{NormalizationWindow, PixelColorFn};
use serde::{Deserialize, Serialize};

use crate::error::{LayerError, Result};

/// Normalization window used for single-band rasters that carry no
/// statistics and have no `no_stats_window` configured. These values suit
/// one particular remote dataset and are not a general default; configure
/// `no_stats_window` (or `data_min`/`data_max`) for anything else.
pub const DEFAULT_NO_STATS_WINDOW: NormalizationWindow = NormalizationWindow {
    min: 10798.0,
    max: 16110.0,
};

/// Options accepted when constructing a layer.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerOptions {
    /// Cap on sampling cells per tile axis.
    pub resolution: usize,

    /// Number of off-screen tile rows/columns the host keeps around.
    pub keep_buffer: u32,

    /// Whether the host re-renders tiles during zoom animations.
    pub update_when_zooming: bool,

    /// Colour scale for single-band rasters.
    pub color_scale: ColorScaleSpec,

    /// Explicit single-band normalization window; both ends are required.
    pub data_min: Option<f64>,
    pub data_max: Option<f64>,

    /// Window used when the raster has no statistics.
    pub no_stats_window: Option<NormalizationWindow>,

    /// Tile edge length in pixels.
    pub tile_size: u32,

    /// Custom value-to-colour function, called with the first band value.
    #[serde(skip)]
    pub pixel_value_to_color_fn: Option<PixelColorFn>,
}

impl Default for LayerOptions {
    fn default() -> Self {
        Self {
            resolution: 32,
            keep_buffer: 25,
            update_when_zooming: false,
            color_scale: ColorScaleSpec::default(),
            data_min: None,
            data_max: None,
            no_stats_window: None,
            tile_size: 256,
            pixel_value_to_color_fn: None,
        }
    }
}

impl LayerOptions {
    /// Parse options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&contents)
    }

    /// Attach a custom value-to-colour function.
    pub fn with_pixel_value_to_color_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) -> Option<Rgba> + Send + Sync + 'static,
    {
        self.pixel_value_to_color_fn = Some(Arc::new(f));
        self
    }

    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_data_range(mut self, min: f64, max: f64) -> Self {
        self.data_min = Some(min);
        self.data_max = Some(max);
        self
    }

    pub fn tile_size(&self) -> TileSize {
        TileSize::square(self.tile_size)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.resolution == 0 {
            return Err("resolution must be > 0".to_string());
        }

        if self.tile_size == 0 {
            return Err("tile_size must be > 0".to_string());
        }

        for (name, value) in [("data_min", self.data_min), ("data_max", self.data_max)] {
            if matches!(value, Some(v) if !v.is_finite()) {
                return Err(format!("{} must be finite", name));
            }
        }

        if let (Some(min), Some(max)) = (self.data_min, self.data_max) {
            if min >= max {
                return Err(format!("data_min ({}) must be below data_max ({})", min, max));
            }
        }

        if let Some(window) = self.no_stats_window {
            if !window.min.is_finite() || !window.max.is_finite() || window.min >= window.max {
                return Err(format!(
                    "no_stats_window must be finite and ordered, got [{}, {}]",
                    window.min, window.max
                ));
            }
        }

        Ok(())
    }

    /// Validate, converting failures to [`LayerError::Initialization`].
    pub fn check(&self) -> Result<()> {
        self.validate().map_err(LayerError::initialization)
    }
}

impl fmt::Debug for LayerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerOptions")
            .field("resolution", &self.resolution)
            .field("keep_buffer", &self.keep_buffer)
            .field("update_when_zooming", &self.update_when_zooming)
            .field("color_scale", &self.color_scale)
            .field("data_min", &self.data_min)
            .field("data_max", &self.data_max)
            .field("no_stats_window", &self.no_stats_window)
            .field("tile_size", &self.tile_size)
            .field(
                "pixel_value_to_color_fn",
                &self.pixel_value_to_color_fn.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}
