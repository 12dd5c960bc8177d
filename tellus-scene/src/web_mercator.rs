//! Spherical pseudo-Mercator (EPSG:3857) forward/inverse projection.
//!
//! This is intentionally the simplified spherical projection used by web tile
//! services, not the full WGS84 geodetic projection: it treats the earth as a
//! sphere of the equatorial radius. The discrepancy with the ellipsoidal
//! conversions elsewhere in this crate is a documented convention, not a bug.

use std::f64::consts::PI;

use glam::DVec2;

use crate::coord::Geodetic;
use crate::ellipsoid::Ellipsoid;

/// Half the projected extent of the globe, in meters.
pub const ORIGIN_SHIFT: f64 = PI * Ellipsoid::WGS84.radius_equator;

/// Largest latitude representable on the square Mercator plane.
pub const MAXIMUM_LATITUDE: f64 = 85.05112877980659;

/// Project lat/lon degrees to Mercator meters. Latitude is clamped to the
/// Mercator limit before projection.
pub fn lat_lon_to_meters(coord: &Geodetic) -> DVec2 {
    let latitude = coord.latitude.clamp(-MAXIMUM_LATITUDE, MAXIMUM_LATITUDE);
    let x = coord.longitude * ORIGIN_SHIFT / 180.0;
    let y = ((90.0 + latitude) * PI / 360.0).tan().ln() / (PI / 180.0) * ORIGIN_SHIFT / 180.0;
    DVec2::new(x, y)
}

/// Unproject Mercator meters back to lat/lon degrees at height zero.
pub fn meters_to_lat_lon(meters: DVec2) -> Geodetic {
    let longitude = meters.x / ORIGIN_SHIFT * 180.0;
    let latitude = meters.y / ORIGIN_SHIFT * 180.0;
    let latitude =
        180.0 / PI * (2.0 * (latitude * PI / 180.0).exp().atan() - PI / 2.0);
    Geodetic::new(latitude, longitude, 0.0)
}
