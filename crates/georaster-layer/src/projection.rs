//! Coordinate mapping between tile pixels, map pixels, geographic
//! coordinates and raster indices.
//!
//! The host map owns the projection; the layer only needs projecting and
//! unprojecting map pixel points at a zoom level, expressed by
//! [`MapProjection`]. Everything else here is a pure function.

use std::f64::consts::PI;

use raster_common::{BoundingBox, LatLng, PixelPoint, TileCoord, TileSize};

use crate::summary::RasterSummary;

/// Maximum latitude representable in Web Mercator
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// Pixel size of the whole world at zoom 0.
const BASE_SCALE: f64 = 256.0;

/// Host projection between geographic coordinates and map pixel space.
pub trait MapProjection: Send + Sync {
    fn project(&self, latlng: LatLng, zoom: u32) -> PixelPoint;

    fn unproject(&self, point: PixelPoint, zoom: u32) -> LatLng;

    /// Geographic bounds of a tile, from its north-west and south-east
    /// pixel corners. Axis order is normalized, so projections whose y axis
    /// points north still produce `south <= north`.
    fn tile_bounds(&self, coord: TileCoord, size: TileSize) -> BoundingBox {
        let nw = coord.nw_pixel(size);
        let se = nw.offset(size.width as f64, size.height as f64);
        let a = self.unproject(nw, coord.z);
        let b = self.unproject(se, coord.z);
        BoundingBox::from_corners((a.lng, a.lat), (b.lng, b.lat))
    }
}

fn zoom_scale(zoom: u32) -> f64 {
    BASE_SCALE * 2f64.powi(zoom as i32)
}

/// Spherical Web Mercator (EPSG:3857), the usual slippy-map projection.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercator;

impl MapProjection for WebMercator {
    fn project(&self, latlng: LatLng, zoom: u32) -> PixelPoint {
        let scale = zoom_scale(zoom);
        let lat = latlng.lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
        let x = latlng.lng / 360.0 + 0.5;
        let y = 0.5 - (PI / 4.0 + lat / 2.0).tan().ln() / (2.0 * PI);
        PixelPoint::new(x * scale, y * scale)
    }

    fn unproject(&self, point: PixelPoint, zoom: u32) -> LatLng {
        let scale = zoom_scale(zoom);
        let lng = (point.x / scale - 0.5) * 360.0;
        let merc_y = (0.5 - point.y / scale) * 2.0 * PI;
        let lat = (2.0 * merc_y.exp().atan() - PI / 2.0).to_degrees();
        LatLng::new(lat, lng)
    }
}

/// Plate carrée (EPSG:4326): longitude and latitude map linearly to pixels,
/// with the world two tiles wide at zoom 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Equirectangular;

impl MapProjection for Equirectangular {
    fn project(&self, latlng: LatLng, zoom: u32) -> PixelPoint {
        let scale = zoom_scale(zoom);
        PixelPoint::new(
            scale * (latlng.lng / 180.0 + 1.0),
            scale * (0.5 - latlng.lat / 180.0),
        )
    }

    fn unproject(&self, point: PixelPoint, zoom: u32) -> LatLng {
        let scale = zoom_scale(zoom);
        LatLng::new(
            (0.5 - point.y / scale) * 180.0,
            (point.x / scale - 1.0) * 180.0,
        )
    }
}

/// Geographic bounds covered by a tile.
pub fn tile_to_geo_bounds(
    coord: TileCoord,
    tile_size: TileSize,
    projection: &dyn MapProjection,
) -> BoundingBox {
    projection.tile_bounds(coord, tile_size)
}

/// Geographic position of a map pixel at `zoom`.
pub fn map_pixel_to_geo(point: PixelPoint, zoom: u32, projection: &dyn MapProjection) -> LatLng {
    projection.unproject(point, zoom)
}

/// Raster pixel index, possibly outside the raster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterIndex {
    pub row: i64,
    pub col: i64,
}

impl RasterIndex {
    /// Clamp into a `width x height` grid. A position exactly on the east or
    /// south raster edge floors to one past the last pixel.
    pub fn clamp_to(&self, width: usize, height: usize) -> (usize, usize) {
        let max_row = height.saturating_sub(1) as i64;
        let max_col = width.saturating_sub(1) as i64;
        (
            self.row.clamp(0, max_row) as usize,
            self.col.clamp(0, max_col) as usize,
        )
    }
}

/// Raster index of a geographic position. North-up rasters: row 0 is at
/// `ymax`, column 0 at `xmin`.
pub fn geo_to_raster_index(latlng: LatLng, summary: &RasterSummary) -> RasterIndex {
    RasterIndex {
        row: ((summary.ymax - latlng.lat) / summary.pixel_height).floor() as i64,
        col: ((latlng.lng - summary.xmin) / summary.pixel_width).floor() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RasterSummary {
        RasterSummary {
            width: 100,
            height: 50,
            pixel_width: 0.5,
            pixel_height: 0.25,
            xmin: 10.0,
            ymin: 40.0,
            xmax: 60.0,
            ymax: 52.5,
            number_of_bands: Some(1),
            mins: vec![],
            maxs: vec![],
            ranges: vec![],
            no_data_value: None,
            values: None,
        }
    }

    #[test]
    fn test_web_mercator_round_trip() {
        let p = WebMercator;
        let ll = LatLng::new(51.5, -0.12);
        let back = p.unproject(p.project(ll, 7), 7);
        assert!((back.lat - ll.lat).abs() < 1e-9);
        assert!((back.lng - ll.lng).abs() < 1e-9);
    }

    #[test]
    fn test_web_mercator_world_tile() {
        let b = WebMercator.tile_bounds(TileCoord::new(0, 0, 0), TileSize::default());
        assert!((b.west() + 180.0).abs() < 1e-9);
        assert!((b.east() - 180.0).abs() < 1e-9);
        assert!((b.north() - MAX_MERCATOR_LAT).abs() < 1e-6);
        assert!((b.south() + MAX_MERCATOR_LAT).abs() < 1e-6);
    }

    #[test]
    fn test_web_mercator_matches_tile_math() {
        let coord = TileCoord::new(5, 17, 10);
        let ours = WebMercator.tile_bounds(coord, TileSize::default());
        let reference = raster_common::tile::tile_to_latlon_bounds(&coord);
        assert!((ours.west() - reference.west()).abs() < 1e-9);
        assert!((ours.north() - reference.north()).abs() < 1e-9);
        assert!((ours.south() - reference.south()).abs() < 1e-9);
    }

    #[test]
    fn test_equirectangular_zoom_zero_tiles() {
        let p = Equirectangular;
        let west = p.tile_bounds(TileCoord::new(0, 0, 0), TileSize::default());
        assert_eq!(west, BoundingBox::new(-180.0, -90.0, 0.0, 90.0));
        let east = p.tile_bounds(TileCoord::new(0, 1, 0), TileSize::default());
        assert_eq!(east, BoundingBox::new(0.0, -90.0, 180.0, 90.0));
    }

    #[test]
    fn test_geo_to_raster_index() {
        let s = summary();
        let idx = geo_to_raster_index(LatLng::new(52.4, 10.1), &s);
        assert_eq!(idx, RasterIndex { row: 0, col: 0 });

        let idx = geo_to_raster_index(LatLng::new(50.0, 20.2), &s);
        assert_eq!(idx, RasterIndex { row: 10, col: 20 });

        let idx = geo_to_raster_index(LatLng::new(53.0, 9.0), &s);
        assert_eq!(idx, RasterIndex { row: -2, col: -2 });
    }

    #[test]
    fn test_clamp_edge_index() {
        let s = summary();
        let idx = geo_to_raster_index(LatLng::new(s.ymin, s.xmax), &s);
        assert_eq!(idx, RasterIndex { row: 50, col: 100 });
        assert_eq!(idx.clamp_to(s.width, s.height), (49, 99));
    }
}
