//! Converting sampled raster values into colours.
//!
//! The strategy is chosen once per layer from its options and band count,
//! then applied to every sample:
//!
//! | strategy            | input                  | output                                 |
//! |---------------------|------------------------|----------------------------------------|
//! | `Custom`            | first band value       | whatever the function returns          |
//! | `SingleBandScaled`  | one band               | `scale((v - min) / (max - min))`       |
//! | `RgbTriple`         | three bands            | `rgb(v0, v1, v2)`, no normalization    |
//! | `Unsupported`       | two or more than three | nothing                                |
//!
//! No-data samples never produce a colour, except through `Custom`, which
//! receives the raw value and decides for itself.

use std::fmt;
use std::sync::Arc;

use raster_common::{ColorScale, Rgba};
use serde::{Deserialize, Serialize};

/// User supplied pixel-to-colour function, called with the first band value.
pub type PixelColorFn = Arc<dyn Fn(f64) -> Option<Rgba> + Send + Sync>;

/// The `[min, max]` window a single band value is normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationWindow {
    pub min: f64,
    pub max: f64,
}

/// Where a resolved window came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSource {
    /// Explicit `data_min`/`data_max` options
    Override,
    /// Dataset statistics (`mins[0]`, `mins[0] + ranges[0]`)
    Statistics,
    /// Configured or default no-statistics window
    Fallback,
}

impl NormalizationWindow {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Position of `value` in the window; 0 at `min`, 1 at `max`. A
    /// zero-width window (constant band statistics) maps everything to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.range();
        if range == 0.0 {
            return 0.0;
        }
        (value - self.min) / range
    }

    /// Pick the window for a single band: explicit override when both ends
    /// are given, then dataset statistics, then the fallback.
    pub fn resolve(
        data_min: Option<f64>,
        data_max: Option<f64>,
        band_min: Option<f64>,
        band_range: Option<f64>,
        fallback: NormalizationWindow,
    ) -> (Self, WindowSource) {
        if let (Some(min), Some(max)) = (data_min, data_max) {
            return (Self::new(min, max), WindowSource::Override);
        }
        if let (Some(min), Some(range)) = (band_min, band_range) {
            return (Self::new(min, min + range), WindowSource::Statistics);
        }
        (fallback, WindowSource::Fallback)
    }
}

/// How sampled values turn into colours.
#[derive(Clone)]
pub enum ColorStrategy {
    Custom(PixelColorFn),
    SingleBandScaled {
        window: NormalizationWindow,
        scale: ColorScale,
    },
    RgbTriple,
    Unsupported {
        bands: usize,
    },
}

impl ColorStrategy {
    /// Strategy for a raster with `bands` bands when no custom function is
    /// configured.
    pub fn for_band_count(bands: usize, window: NormalizationWindow, scale: ColorScale) -> Self {
        match bands {
            1 => ColorStrategy::SingleBandScaled { window, scale },
            3 => ColorStrategy::RgbTriple,
            n => ColorStrategy::Unsupported { bands: n },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorStrategy::Custom(_) => "custom",
            ColorStrategy::SingleBandScaled { .. } => "single_band_scaled",
            ColorStrategy::RgbTriple => "rgb_triple",
            ColorStrategy::Unsupported { .. } => "unsupported",
        }
    }
}

impl fmt::Debug for ColorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorStrategy::Custom(_) => f.write_str("Custom(<fn>)"),
            ColorStrategy::SingleBandScaled { window, .. } => f
                .debug_struct("SingleBandScaled")
                .field("window", window)
                .finish_non_exhaustive(),
            ColorStrategy::RgbTriple => f.write_str("RgbTriple"),
            ColorStrategy::Unsupported { bands } => f
                .debug_struct("Unsupported")
                .field("bands", bands)
                .finish(),
        }
    }
}

/// Per-layer values the colorizer needs besides the strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ColorContext {
    pub no_data_value: Option<f64>,
}

impl ColorContext {
    pub fn new(no_data_value: Option<f64>) -> Self {
        Self { no_data_value }
    }

    /// A NaN no-data sentinel matches NaN samples.
    pub fn is_no_data(&self, value: f64) -> bool {
        match self.no_data_value {
            Some(nd) if nd.is_nan() => value.is_nan(),
            Some(nd) => value == nd,
            None => false,
        }
    }
}

/// Resolve the colour for one sample (one value per band).
pub fn resolve_color(values: &[f64], strategy: &ColorStrategy, ctx: &ColorContext) -> Option<Rgba> {
    match strategy {
        ColorStrategy::Custom(f) => values.first().and_then(|v| f(*v)),
        ColorStrategy::SingleBandScaled { window, scale } => match values {
            [v] if !ctx.is_no_data(*v) => scale.sample(window.normalize(*v)),
            _ => None,
        },
        ColorStrategy::RgbTriple => match values {
            [r, g, b] if !ctx.is_no_data(*r) => Some(Rgba::from_channels(*r, *g, *b)),
            _ => None,
        },
        ColorStrategy::Unsupported { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn percent_window() -> NormalizationWindow {
        NormalizationWindow::new(0.0, 100.0)
    }

    fn single_band() -> ColorStrategy {
        ColorStrategy::for_band_count(1, percent_window(), ColorScale::default())
    }

    #[test]
    fn test_window_prefers_override() {
        let fallback = NormalizationWindow::new(-1.0, 1.0);
        let (w, src) = NormalizationWindow::resolve(Some(5.0), Some(10.0), Some(0.0), Some(100.0), fallback);
        assert_eq!(w, NormalizationWindow::new(5.0, 10.0));
        assert_eq!(src, WindowSource::Override);
    }

    #[test]
    fn test_window_needs_both_override_ends() {
        let fallback = NormalizationWindow::new(-1.0, 1.0);
        let (w, src) = NormalizationWindow::resolve(Some(5.0), None, Some(2.0), Some(8.0), fallback);
        assert_eq!(w, NormalizationWindow::new(2.0, 10.0));
        assert_eq!(src, WindowSource::Statistics);

        let (w, src) = NormalizationWindow::resolve(None, Some(9.0), None, None, fallback);
        assert_eq!(w, fallback);
        assert_eq!(src, WindowSource::Fallback);
    }

    #[test]
    fn test_single_band_no_data_has_no_color() {
        let ctx = ColorContext::new(Some(-1.0));
        assert_eq!(resolve_color(&[-1.0], &single_band(), &ctx), None);
        assert!(resolve_color(&[50.0], &single_band(), &ctx).is_some());
    }

    #[test]
    fn test_nan_no_data_matches_nan() {
        let ctx = ColorContext::new(Some(f64::NAN));
        assert_eq!(resolve_color(&[f64::NAN], &single_band(), &ctx), None);
        assert!(resolve_color(&[1.0], &single_band(), &ctx).is_some());
    }

    #[test]
    fn test_single_band_uses_scale() {
        let ctx = ColorContext::default();
        let scale = ColorScale::default();
        assert_eq!(
            resolve_color(&[25.0], &single_band(), &ctx),
            scale.sample(0.25)
        );
    }

    #[test]
    fn test_rgb_triple_is_direct() {
        let ctx = ColorContext::new(Some(0.0));
        let strategy = ColorStrategy::for_band_count(3, percent_window(), ColorScale::default());
        assert_eq!(
            resolve_color(&[10.0, 20.0, 30.0], &strategy, &ctx),
            Some(Rgba::rgb(10, 20, 30))
        );
        assert_eq!(resolve_color(&[0.0, 20.0, 30.0], &strategy, &ctx), None);
    }

    #[test]
    fn test_two_and_four_bands_unsupported() {
        let ctx = ColorContext::default();
        for bands in [0, 2, 4] {
            let strategy = ColorStrategy::for_band_count(bands, percent_window(), ColorScale::default());
            assert!(matches!(strategy, ColorStrategy::Unsupported { .. }));
            let values = vec![1.0; bands];
            assert_eq!(resolve_color(&values, &strategy, &ctx), None);
        }
    }

    #[test]
    fn test_custom_fn_sees_first_band_and_no_data() {
        let ctx = ColorContext::new(Some(-1.0));
        let f: PixelColorFn = Arc::new(|v| {
            if v < 0.0 {
                Some(Rgba::rgb(255, 0, 0))
            } else {
                None
            }
        });
        let strategy = ColorStrategy::Custom(f);
        assert_eq!(
            resolve_color(&[-1.0, 99.0], &strategy, &ctx),
            Some(Rgba::rgb(255, 0, 0))
        );
        assert_eq!(resolve_color(&[3.0], &strategy, &ctx), None);
        assert_eq!(resolve_color(&[], &strategy, &ctx), None);
    }

    #[test]
    fn test_zero_width_window_still_colours() {
        let strategy = ColorStrategy::for_band_count(
            1,
            NormalizationWindow::new(7.0, 7.0),
            ColorScale::default(),
        );
        let ctx = ColorContext::new(Some(-1.0));
        assert_eq!(
            resolve_color(&[7.0], &strategy, &ctx),
            Some(Rgba::rgb(255, 255, 255))
        );
        assert_eq!(resolve_color(&[-1.0], &strategy, &ctx), None);
    }

    #[test]
    fn test_normalization_is_monotonic() {
        let window = NormalizationWindow::new(-20.0, 40.0);
        let mut last = f64::NEG_INFINITY;
        for i in -100..=100 {
            let pos = window.normalize(i as f64);
            assert!(pos >= last);
            last = pos;
        }
    }
}
