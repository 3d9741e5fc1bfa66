//! Georeferenced raster tile layer.
//!
//! Renders a raster (resident in memory or read through a windowed
//! [`RasterSource`]) as slippy-map tiles. For each tile the layer works out
//! the geographic bounds, picks an adaptive sampling grid, reads one value
//! per cell, colours it and paints the cell onto the tile surface.
//!
//! ```ignore
//! let layer = GeoRasterLayer::new(GeoRaster::resident(summary), LayerOptions::default());
//! let surface = layer.begin_tile(TileCoord::new(3, 4, 2)).ready().await?;
//! ```

pub mod config;
pub mod error;
pub mod layer;
pub mod metrics;
pub mod projection;
pub mod render;
pub mod sampler;
pub mod source;
pub mod summary;

pub use config::{LayerOptions, DEFAULT_NO_STATS_WINDOW};
pub use error::{LayerError, Result};
pub use layer::{
    CanvasFactory, GeoRasterLayer, LayerBuilder, SurfaceFactory, TileCallback, TileHandle,
    TileProvider,
};
pub use metrics::{MetricsSnapshot, RenderMetrics};
pub use projection::{
    geo_to_raster_index, map_pixel_to_geo, tile_to_geo_bounds, Equirectangular, MapProjection,
    RasterIndex, WebMercator,
};
pub use render::{TileRenderer, TileReport};
pub use sampler::{CellLocation, RegionSampler, SamplingGrid, SamplingMode, TileValues};
pub use source::{InMemorySource, PixelWindow, RasterSource};
pub use summary::{BandGrid, GeoRaster, RasterSummary};
