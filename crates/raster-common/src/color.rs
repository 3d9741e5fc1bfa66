//! Colour representations and colour scales.
//!
//! [`Color`] is the configuration-facing form (hex string, name, component
//! array or explicit RGBA). [`Rgba`] is the resolved value painted onto
//! tiles. [`ColorScale`] maps a normalized position in `[0, 1]` to an
//! [`Rgba`] by interpolating between colour stops.

use crate::error::{ColorError, ColorResult};
use crate::palettes;
use serde::{Deserialize, Serialize};

/// A resolved 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Build an opaque colour from raw channel values, rounding and
    /// saturating each to `0..=255`.
    pub fn from_channels(r: f64, g: f64, b: f64) -> Self {
        let channel = |v: f64| {
            if v.is_nan() {
                0
            } else {
                v.round().clamp(0.0, 255.0) as u8
            }
        };
        Self::rgb(channel(r), channel(g), channel(b))
    }

    /// CSS style `#rrggbb` form.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Linear interpolation between two colours.
    pub fn lerp(&self, other: &Rgba, t: f64, interp: &Interpolation) -> Rgba {
        let t = t.clamp(0.0, 1.0);

        let lerp_u8 = |a: u8, b: u8, t: f64| -> u8 {
            ((a as f64) * (1.0 - t) + (b as f64) * t).round() as u8
        };

        match interp {
            Interpolation::Linear => Rgba {
                r: lerp_u8(self.r, other.r, t),
                g: lerp_u8(self.g, other.g, t),
                b: lerp_u8(self.b, other.b, t),
                a: lerp_u8(self.a, other.a, t),
            },
            Interpolation::Step => {
                if t < 0.5 {
                    *self
                } else {
                    *other
                }
            }
        }
    }
}

/// Colour representation supporting multiple configuration formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Color {
    /// Explicit RGBA
    Rgba { r: u8, g: u8, b: u8, a: u8 },

    /// RGB array: [r, g, b] or [r, g, b, a]
    Array(Vec<u8>),

    /// Hex string ("#RRGGBB", "#RRGGBBAA", "#RGB") or a named colour
    Named(String),
}

impl Color {
    pub fn named(name: impl Into<String>) -> Self {
        Color::Named(name.into())
    }

    /// Resolve to an [`Rgba`] value.
    pub fn to_rgba(&self) -> ColorResult<Rgba> {
        match self {
            Color::Rgba { r, g, b, a } => Ok(Rgba::new(*r, *g, *b, *a)),
            Color::Array(arr) => match arr.as_slice() {
                [r, g, b] => Ok(Rgba::rgb(*r, *g, *b)),
                [r, g, b, a] => Ok(Rgba::new(*r, *g, *b, *a)),
                other => Err(ColorError::InvalidArray(other.len())),
            },
            Color::Named(s) => parse_css_color(s),
        }
    }
}

impl From<Rgba> for Color {
    fn from(c: Rgba) -> Self {
        Color::Rgba {
            r: c.r,
            g: c.g,
            b: c.b,
            a: c.a,
        }
    }
}

/// Resolve a CSS colour string: any of the 148 named colours,
/// `transparent`, hex forms or `rgb()`/`hsl()` functions.
fn parse_css_color(s: &str) -> ColorResult<Rgba> {
    match csscolorparser::parse(s) {
        Ok(color) => {
            let [r, g, b, a] = color.to_rgba8();
            Ok(Rgba::new(r, g, b, a))
        }
        Err(_) if s.trim_start().starts_with('#') => Err(ColorError::InvalidHex(s.to_string())),
        Err(_) => Err(ColorError::UnknownName(s.to_string())),
    }
}

/// Interpolation method between colour stops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
}

/// Configured colour scale.
///
/// Accepts a palette name (`"viridis"`), a bare list of colours spread
/// evenly over `[0, 1]`, or a ramp with explicit stop positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorScaleSpec {
    Palette(String),
    Colors(Vec<Color>),
    Ramp {
        colors: Vec<Color>,
        #[serde(default)]
        positions: Option<Vec<f64>>,
        #[serde(default)]
        interpolation: Interpolation,
    },
}

impl Default for ColorScaleSpec {
    fn default() -> Self {
        ColorScaleSpec::Colors(vec![Color::named("white"), Color::named("black")])
    }
}

/// A resolved colour scale: sorted stops over `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    stops: Vec<(f64, Rgba)>,
    interpolation: Interpolation,
}

impl ColorScale {
    /// Resolve a configured scale, validating every colour and stop.
    pub fn from_spec(spec: &ColorScaleSpec) -> ColorResult<Self> {
        let (colors, positions, interpolation) = match spec {
            ColorScaleSpec::Palette(name) => {
                let stops = palettes::lookup(name)
                    .ok_or_else(|| ColorError::UnknownScale(name.clone()))?;
                let colors = stops.iter().map(|hex| Color::named(*hex)).collect();
                (colors, None, Interpolation::Linear)
            }
            ColorScaleSpec::Colors(colors) => (colors.clone(), None, Interpolation::Linear),
            ColorScaleSpec::Ramp {
                colors,
                positions,
                interpolation,
            } => (colors.clone(), positions.clone(), interpolation.clone()),
        };

        if colors.is_empty() {
            return Err(ColorError::invalid_scale("at least one color is required"));
        }

        let resolved = colors
            .iter()
            .map(Color::to_rgba)
            .collect::<ColorResult<Vec<_>>>()?;

        let positions = match positions {
            Some(p) => {
                if p.len() != resolved.len() {
                    return Err(ColorError::invalid_scale(format!(
                        "{} positions for {} colors",
                        p.len(),
                        resolved.len()
                    )));
                }
                if p.windows(2).any(|w| !(w[1] > w[0])) || p.iter().any(|v| !v.is_finite()) {
                    return Err(ColorError::invalid_scale(
                        "positions must be finite and strictly ascending",
                    ));
                }
                p
            }
            None if resolved.len() == 1 => vec![0.0],
            None => {
                let last = (resolved.len() - 1) as f64;
                (0..resolved.len()).map(|i| i as f64 / last).collect()
            }
        };

        Ok(Self {
            stops: positions.into_iter().zip(resolved).collect(),
            interpolation,
        })
    }

    /// Sample the scale at a normalized position.
    ///
    /// Positions outside the stop range clamp to the end colours. `NaN`
    /// yields `None`.
    pub fn sample(&self, t: f64) -> Option<Rgba> {
        if t.is_nan() {
            return None;
        }

        let first = self.stops.first()?;
        let last = self.stops.last()?;
        if t <= first.0 {
            return Some(first.1);
        }
        if t >= last.0 {
            return Some(last.1);
        }

        for pair in self.stops.windows(2) {
            let (low, high) = (&pair[0], &pair[1]);
            if t <= high.0 {
                let local = (t - low.0) / (high.0 - low.0);
                return Some(low.1.lerp(&high.1, local, &self.interpolation));
            }
        }

        Some(last.1)
    }

    pub fn stops(&self) -> &[(f64, Rgba)] {
        &self.stops
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        Self {
            stops: vec![
                (0.0, Rgba::rgb(255, 255, 255)),
                (1.0, Rgba::rgb(0, 0, 0)),
            ],
            interpolation: Interpolation::Linear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        let hex = Color::named("#FF5500");
        assert_eq!(hex.to_rgba().unwrap(), Rgba::rgb(255, 85, 0));

        let short = Color::named("#f50");
        assert_eq!(short.to_rgba().unwrap(), Rgba::rgb(255, 85, 0));

        let arr = Color::Array(vec![100, 150, 200]);
        assert_eq!(arr.to_rgba().unwrap(), Rgba::rgb(100, 150, 200));

        let named = Color::named("Red");
        assert_eq!(named.to_rgba().unwrap(), Rgba::rgb(255, 0, 0));
    }

    #[test]
    fn test_color_parsing_errors() {
        assert!(matches!(
            Color::named("#GGGGGG").to_rgba(),
            Err(ColorError::InvalidHex(_))
        ));
        assert!(matches!(
            Color::named("blurple").to_rgba(),
            Err(ColorError::UnknownName(_))
        ));
        assert!(matches!(
            Color::Array(vec![1, 2]).to_rgba(),
            Err(ColorError::InvalidArray(2))
        ));
    }

    #[test]
    fn test_default_scale_is_white_to_black() {
        let scale = ColorScale::from_spec(&ColorScaleSpec::default()).unwrap();
        assert_eq!(scale.sample(0.0), Some(Rgba::rgb(255, 255, 255)));
        assert_eq!(scale.sample(1.0), Some(Rgba::rgb(0, 0, 0)));
        assert_eq!(scale.sample(0.5), Some(Rgba::rgb(128, 128, 128)));
    }

    #[test]
    fn test_sample_clamps_and_rejects_nan() {
        let scale = ColorScale::default();
        assert_eq!(scale.sample(-3.0), scale.sample(0.0));
        assert_eq!(scale.sample(7.0), scale.sample(1.0));
        assert_eq!(scale.sample(f64::INFINITY), scale.sample(1.0));
        assert_eq!(scale.sample(f64::NAN), None);
    }

    #[test]
    fn test_ramp_with_positions() {
        let json = r##"{"colors":["#000000","#ff0000","#ffffff"],"positions":[0.0,0.2,1.0]}"##;
        let spec: ColorScaleSpec = serde_json::from_str(json).unwrap();
        let scale = ColorScale::from_spec(&spec).unwrap();
        assert_eq!(scale.sample(0.2), Some(Rgba::rgb(255, 0, 0)));
        assert_eq!(scale.sample(0.1), Some(Rgba::rgb(128, 0, 0)));
    }

    #[test]
    fn test_ramp_rejects_unsorted_positions() {
        let spec = ColorScaleSpec::Ramp {
            colors: vec![Color::named("red"), Color::named("blue")],
            positions: Some(vec![1.0, 0.0]),
            interpolation: Interpolation::Linear,
        };
        assert!(ColorScale::from_spec(&spec).is_err());
    }

    #[test]
    fn test_palette_by_name() {
        let spec: ColorScaleSpec = serde_json::from_str(r#""viridis""#).unwrap();
        let scale = ColorScale::from_spec(&spec).unwrap();
        assert_eq!(scale.stops().len(), 5);
        assert_eq!(scale.sample(0.0), Some(Rgba::rgb(0x44, 0x01, 0x54)));

        let unknown = ColorScaleSpec::Palette("nope".to_string());
        assert!(matches!(
            ColorScale::from_spec(&unknown),
            Err(ColorError::UnknownScale(_))
        ));
    }

    #[test]
    fn test_any_css_colour_name() {
        assert_eq!(Color::named("steelblue").to_rgba().unwrap(), Rgba::rgb(70, 130, 180));
        assert_eq!(Color::named("Crimson").to_rgba().unwrap(), Rgba::rgb(220, 20, 60));
        assert_eq!(Color::named("rgb(1, 2, 3)").to_rgba().unwrap(), Rgba::rgb(1, 2, 3));
        assert_eq!(Color::named("transparent").to_rgba().unwrap().a, 0);
    }

    #[test]
    fn test_brewer_palette_any_case() {
        let scale = ColorScale::from_spec(&ColorScaleSpec::Palette("YlGnBu".into())).unwrap();
        assert_eq!(scale.stops().len(), 9);
        assert_eq!(scale.sample(0.0), Some(Rgba::rgb(0xff, 0xff, 0xd9)));
        assert_eq!(scale.sample(1.0), Some(Rgba::rgb(0x08, 0x1d, 0x58)));

        let lower = ColorScale::from_spec(&ColorScaleSpec::Palette("ylgnbu".into())).unwrap();
        assert_eq!(lower, scale);
    }

    #[test]
    fn test_step_interpolation() {
        let spec = ColorScaleSpec::Ramp {
            colors: vec![Color::named("black"), Color::named("white")],
            positions: None,
            interpolation: Interpolation::Step,
        };
        let scale = ColorScale::from_spec(&spec).unwrap();
        assert_eq!(scale.sample(0.4), Some(Rgba::rgb(0, 0, 0)));
        assert_eq!(scale.sample(0.6), Some(Rgba::rgb(255, 255, 255)));
    }

    #[test]
    fn test_from_channels_saturates() {
        assert_eq!(Rgba::from_channels(10.0, 20.0, 30.0), Rgba::rgb(10, 20, 30));
        assert_eq!(Rgba::from_channels(-4.0, 300.0, 12.6), Rgba::rgb(0, 255, 13));
        assert_eq!(Rgba::rgb(10, 20, 30).to_hex(), "#0a141e");
    }
}
