use serde::{Deserialize, Serialize};

use crate::coord::Geodetic;

/// Geographic rectangle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Rectangle {
    /// The whole globe.
    pub const MAX_VALUE: Rectangle = Rectangle {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    pub fn compute_width(&self) -> f64 {
        self.east - self.west
    }

    pub fn compute_height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> Geodetic {
        Geodetic::new(
            (self.south + self.north) * 0.5,
            (self.west + self.east) * 0.5,
            0.0,
        )
    }

    pub fn contains(&self, coord: &Geodetic) -> bool {
        coord.longitude >= self.west
            && coord.longitude <= self.east
            && coord.latitude >= self.south
            && coord.latitude <= self.north
    }
}

impl Default for Rectangle {
    fn default() -> Self {
        Rectangle::MAX_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_height_center() {
        let r = Rectangle::new(-180.0, -90.0, 180.0, 90.0);
        assert_eq!(r.compute_width(), 360.0);
        assert_eq!(r.compute_height(), 180.0);
        let c = r.center();
        assert_eq!(c.latitude, 0.0);
        assert_eq!(c.longitude, 0.0);
    }

    #[test]
    fn contains_is_boundary_inclusive() {
        let r = Rectangle::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(&Geodetic::new(0.0, 0.0, 0.0)));
        assert!(r.contains(&Geodetic::new(10.0, 10.0, 0.0)));
        assert!(!r.contains(&Geodetic::new(10.1, 5.0, 0.0)));
    }
}
