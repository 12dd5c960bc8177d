use glam::{DMat3, DMat4, DVec3};

use crate::coord::Geodetic;

/// Reference ellipsoid for geodetic/ECEF conversions.
///
/// The conversion formulas follow the OpenSceneGraph CoordinateSystemNode
/// derivation: closed-form forward conversion, and the Bowring-style inverse
/// with a single first-order latitude approximation (no Newton iteration).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub radius_equator: f64,
    pub radius_polar: f64,
    pub flattening: f64,
    pub eccentricity_squared: f64,
    pub eccentricity_prime_squared: f64,
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Ellipsoid::WGS84
    }
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid::new(6378137.0, 6356752.3142);
    pub const UNIT_SPHERE: Ellipsoid = Ellipsoid::new(1.0, 1.0);

    pub const fn new(radius_equator: f64, radius_polar: f64) -> Self {
        let flattening = (radius_equator - radius_polar) / radius_equator;
        let eccentricity_squared = 2.0 * flattening - flattening * flattening;
        let eccentricity_prime_squared = (radius_equator * radius_equator
            - radius_polar * radius_polar)
            / (radius_polar * radius_polar);
        Self {
            radius_equator,
            radius_polar,
            flattening,
            eccentricity_squared,
            eccentricity_prime_squared,
        }
    }

    /// Non-uniform scale taking the unit sphere onto this ellipsoid.
    pub fn unit_sphere_to_ellipsoid(&self) -> DMat4 {
        DMat4::from_scale(DVec3::new(
            self.radius_equator,
            self.radius_equator,
            self.radius_polar,
        ))
    }

    /// Inverse scale taking the ellipsoid into the unit-sphere basis.
    pub fn ellipsoid_to_unit_sphere(&self) -> DMat4 {
        DMat4::from_scale(DVec3::new(
            1.0 / self.radius_equator,
            1.0 / self.radius_equator,
            1.0 / self.radius_polar,
        ))
    }

    pub fn geodetic_to_ecef(&self, coord: &Geodetic) -> DVec3 {
        let latitude = coord.latitude.to_radians();
        let longitude = coord.longitude.to_radians();
        let height = coord.height;

        let sin_latitude = latitude.sin();
        let cos_latitude = latitude.cos();
        let n = self.radius_equator
            / (1.0 - self.eccentricity_squared * sin_latitude * sin_latitude).sqrt();

        DVec3::new(
            (n + height) * cos_latitude * longitude.cos(),
            (n + height) * cos_latitude * longitude.sin(),
            (n * (1.0 - self.eccentricity_squared) + height) * sin_latitude,
        )
    }

    pub fn ecef_to_geodetic(&self, ecef: DVec3) -> Geodetic {
        let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
        let theta = (ecef.z * self.radius_equator).atan2(p * self.radius_polar);

        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        let latitude = ((ecef.z
            + self.eccentricity_prime_squared
                * self.radius_polar
                * sin_theta
                * sin_theta
                * sin_theta)
            / (p - self.eccentricity_squared
                * self.radius_equator
                * cos_theta
                * cos_theta
                * cos_theta))
            .atan();
        let longitude = ecef.y.atan2(ecef.x);

        let sin_latitude = latitude.sin();
        let n = self.radius_equator
            / (1.0 - self.eccentricity_squared * sin_latitude * sin_latitude).sqrt();
        let height = p / latitude.cos() - n;

        Geodetic::new(latitude.to_degrees(), longitude.to_degrees(), height)
    }

    /// Orthonormal east/north/up basis tangent to the surface at `coord`,
    /// as the rows east, north, up.
    pub fn local_frame(&self, coord: &Geodetic) -> DMat3 {
        let latitude = coord.latitude.to_radians();
        let longitude = coord.longitude.to_radians();

        let up = DVec3::new(
            longitude.cos() * latitude.cos(),
            longitude.sin() * latitude.cos(),
            latitude.sin(),
        );
        let east = DVec3::new(-longitude.sin(), longitude.cos(), 0.0);
        let north = up.cross(east);

        DMat3::from_cols(east, north, up).transpose()
    }

    /// Geocentric surface normal, the ellipsoid normal approximation used for
    /// tilt estimation.
    pub fn geocentric_surface_normal(position: DVec3) -> DVec3 {
        position.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::equals_epsilon;

    #[test]
    fn geodetic_to_ecef_equator() {
        let e = Ellipsoid::WGS84;
        let ecef = e.geodetic_to_ecef(&Geodetic::new(0.0, 0.0, 0.0));
        assert!(equals_epsilon(ecef.x, e.radius_equator, 1e-6));
        assert!(equals_epsilon(ecef.y, 0.0, 1e-6));
        assert!(equals_epsilon(ecef.z, 0.0, 1e-6));
    }

    #[test]
    fn geodetic_to_ecef_pole() {
        let e = Ellipsoid::WGS84;
        let ecef = e.geodetic_to_ecef(&Geodetic::new(90.0, 0.0, 0.0));
        assert!(equals_epsilon(ecef.x, 0.0, 1e-6));
        assert!(equals_epsilon(ecef.z, e.radius_polar, 1e-6));
    }

    #[test]
    fn round_trip_geodetic() {
        let e = Ellipsoid::WGS84;
        for &(lat, lon, h) in &[
            (0.0, 0.0, 0.0),
            (45.0, 45.0, 1000.0),
            (-33.8, 151.2, 25.0),
            (60.0, -135.0, -50.0),
            (89.0, 10.0, 8848.0),
        ] {
            let coord = Geodetic::new(lat, lon, h);
            let back = e.ecef_to_geodetic(e.geodetic_to_ecef(&coord));
            assert!(
                equals_epsilon(back.latitude, lat, 1e-6),
                "latitude {} vs {}",
                back.latitude,
                lat
            );
            assert!(
                equals_epsilon(back.longitude, lon, 1e-6),
                "longitude {} vs {}",
                back.longitude,
                lon
            );
            assert!(
                equals_epsilon(back.height, h, 1e-3),
                "height {} vs {}",
                back.height,
                h
            );
        }
    }

    #[test]
    fn local_frame_at_origin() {
        let e = Ellipsoid::WGS84;
        let frame = e.local_frame(&Geodetic::new(0.0, 0.0, 0.0));
        // At (0, 0) east is +Y, north is +Z, up is +X.
        let east = frame.row(0);
        let north = frame.row(1);
        let up = frame.row(2);
        assert!(east.abs_diff_eq(DVec3::Y, 1e-12));
        assert!(north.abs_diff_eq(DVec3::Z, 1e-12));
        assert!(up.abs_diff_eq(DVec3::X, 1e-12));
    }

    #[test]
    fn local_frame_is_orthonormal() {
        let e = Ellipsoid::WGS84;
        let frame = e.local_frame(&Geodetic::new(37.0, -122.0, 0.0));
        let east = frame.row(0);
        let north = frame.row(1);
        let up = frame.row(2);
        assert!(equals_epsilon(east.length(), 1.0, 1e-12));
        assert!(equals_epsilon(north.length(), 1.0, 1e-12));
        assert!(equals_epsilon(up.length(), 1.0, 1e-12));
        assert!(equals_epsilon(east.dot(north), 0.0, 1e-12));
        assert!(equals_epsilon(east.dot(up), 0.0, 1e-12));
        assert!(equals_epsilon(north.dot(up), 0.0, 1e-12));
    }
}
