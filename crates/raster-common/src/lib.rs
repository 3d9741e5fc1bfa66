//! Common types shared across the georaster tile rendering workspace.

pub mod bbox;
pub mod color;
pub mod error;
pub mod palettes;
pub mod tile;

pub use bbox::BoundingBox;
pub use color::{Color, ColorScale, ColorScaleSpec, Interpolation, Rgba};
pub use error::{ColorError, ColorResult};
pub use tile::{LatLng, PixelPoint, TileCoord, TileSize};
