//! Geographic coordinate math for the tree map.
//!
//! Positions are WGS84 lng/lat. The cluster index and viewport queries work
//! in Web-Mercator "world" coordinates: the whole map projected onto the
//! unit square `[0, 1] × [0, 1]`, with a 256-pixel base tile so that at zoom
//! `z` one world unit spans `256 * 2^z` screen pixels.

use serde::{Deserialize, Serialize};

/// Base tile size in pixels, fixing the world-to-pixel scale per zoom.
pub const TILE_SIZE: f64 = 256.0;

/// Mercator latitude limit; poles project to infinity so inputs are clamped.
pub const MAX_LATITUDE: f64 = 85.05112878;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

/// Project a longitude to world X in `[0, 1]`.
pub fn lng_to_world_x(lng: f64) -> f64 {
    lng / 360.0 + 0.5
}

/// Project a latitude to world Y in `[0, 1]` (north edge at 0).
pub fn lat_to_world_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / std::f64::consts::PI;
    y.clamp(0.0, 1.0)
}

/// Inverse of `lng_to_world_x`.
pub fn world_x_to_lng(x: f64) -> f64 {
    (x - 0.5) * 360.0
}

/// Inverse of `lat_to_world_y`.
pub fn world_y_to_lat(y: f64) -> f64 {
    let n = std::f64::consts::PI * (1.0 - 2.0 * y);
    n.sinh().atan().to_degrees()
}

/// Project a position to world coordinates.
pub fn project(pos: LngLat) -> (f64, f64) {
    (lng_to_world_x(pos.lng), lat_to_world_y(pos.lat))
}

/// Unproject world coordinates back to lng/lat.
pub fn unproject(x: f64, y: f64) -> LngLat {
    LngLat::new(world_x_to_lng(x), world_y_to_lat(y))
}

/// Convert a pixel distance at a given zoom to world units.
pub fn px_to_world(px: f64, zoom: f64) -> f64 {
    px / (TILE_SIZE * 2f64.powf(zoom))
}

/// Axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLatBounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl LngLatBounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// The whole projectable world.
    pub fn world() -> Self {
        Self::new(-180.0, -MAX_LATITUDE, 180.0, MAX_LATITUDE)
    }

    pub fn contains(&self, pos: LngLat) -> bool {
        pos.lng >= self.west && pos.lng <= self.east && pos.lat >= self.south && pos.lat <= self.north
    }

    /// Bounds in world coordinates as `(min_x, min_y, max_x, max_y)`.
    ///
    /// Note north maps to the *smaller* Y.
    pub fn to_world(&self) -> (f64, f64, f64, f64) {
        (
            lng_to_world_x(self.west),
            lat_to_world_y(self.north),
            lng_to_world_x(self.east),
            lat_to_world_y(self.south),
        )
    }
}
