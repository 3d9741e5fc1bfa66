//! Drawing and colorization for georaster map tiles.
//!
//! - [`canvas`]: tile-sized drawable surfaces and the `fill_rect` primitive
//! - [`colorize`]: converting sampled band values into colours
//! - [`png`]: encoding finished tiles

pub mod canvas;
pub mod colorize;
pub mod error;
pub mod png;

pub use canvas::{shared_surface, lock_surface, PixelRect, SharedSurface, Surface, TileCanvas};
pub use colorize::{
    resolve_color, ColorContext, ColorStrategy, NormalizationWindow, PixelColorFn, WindowSource,
};
pub use error::{RenderError, RenderResult};
