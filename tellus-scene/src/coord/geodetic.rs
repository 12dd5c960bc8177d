use std::fmt;

use crate::math::{normalize_latitude, normalize_longitude};

/// Geodetic coordinate referenced to the ellipsoid: degrees north from the
/// equator, degrees east from the prime meridian, meters above the surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Geodetic {
    pub latitude: f64,
    pub longitude: f64,
    pub height: f64,
}

impl Geodetic {
    pub fn new(latitude: f64, longitude: f64, height: f64) -> Self {
        Self {
            latitude,
            longitude,
            height,
        }
    }

    /// Clamp latitude to the poles and wrap longitude into (-180, 180].
    pub fn normalized(&self) -> Self {
        Self {
            latitude: normalize_latitude(self.latitude),
            longitude: normalize_longitude(self.longitude),
            height: self.height,
        }
    }
}

impl fmt::Display for Geodetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.6}, {:.6}, {:.3}m)",
            self.latitude, self.longitude, self.height
        )
    }
}
