use glam::DVec3;

use crate::ellipsoid::Ellipsoid;

/// Intersect the segment from `start` to `end` with the ellipsoid surface.
///
/// Both endpoints are scaled into the unit-sphere basis, the segment/sphere
/// quadratic is solved there, and the nearest root with t in (0, 1) is scaled
/// back. Returns `None` when the discriminant is non-positive or both roots
/// fall outside the open segment.
pub fn intersect_with_ellipsoid(ellipsoid: &Ellipsoid, start: DVec3, end: DVec3) -> Option<DVec3> {
    let to_unit = ellipsoid.ellipsoid_to_unit_sphere();
    let to_ellipsoid = ellipsoid.unit_sphere_to_ellipsoid();

    let start = to_unit.transform_point3(start);
    let end = to_unit.transform_point3(end);

    let diff = end - start;

    let a = diff.dot(diff);
    let b = (diff * 2.0).dot(start);
    let c = start.dot(start) - 1.0;

    let disc = b * b - 4.0 * a * c;
    if disc <= 0.0 {
        return None;
    }

    let sqrt_disc = disc.sqrt();
    let t1 = (-b - sqrt_disc) / (2.0 * a);
    let t2 = (-b + sqrt_disc) / (2.0 * a);

    for t in [t1, t2] {
        if t > 0.0 && t < 1.0 {
            let hit = start + diff * t;
            return Some(to_ellipsoid.transform_point3(hit));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::equals_epsilon;

    #[test]
    fn segment_through_center_hits_near_side() {
        let e = Ellipsoid::WGS84;
        let start = DVec3::new(2.0 * e.radius_equator, 0.0, 0.0);
        let end = DVec3::ZERO;
        let hit = intersect_with_ellipsoid(&e, start, end).expect("expected intersection");
        assert!(equals_epsilon(hit.x, e.radius_equator, 1e-6));
        assert!(equals_epsilon(hit.y, 0.0, 1e-6));
        assert!(equals_epsilon(hit.z, 0.0, 1e-6));
    }

    #[test]
    fn segment_spanning_the_ellipsoid_returns_first_root() {
        let e = Ellipsoid::WGS84;
        let start = DVec3::new(0.0, -3.0 * e.radius_equator, 0.0);
        let end = DVec3::new(0.0, 3.0 * e.radius_equator, 0.0);
        let hit = intersect_with_ellipsoid(&e, start, end).expect("expected intersection");
        // Nearest root: the -Y side of the ellipsoid.
        assert!(equals_epsilon(hit.y, -e.radius_equator, 1e-6));
    }

    #[test]
    fn segment_outside_misses() {
        let e = Ellipsoid::WGS84;
        let start = DVec3::new(2.0 * e.radius_equator, 2.0 * e.radius_equator, 0.0);
        let end = DVec3::new(2.0 * e.radius_equator, -2.0 * e.radius_equator, 0.0);
        assert!(intersect_with_ellipsoid(&e, start, end).is_none());
    }

    #[test]
    fn segment_short_of_the_surface_misses() {
        let e = Ellipsoid::WGS84;
        let start = DVec3::new(3.0 * e.radius_equator, 0.0, 0.0);
        let end = DVec3::new(2.0 * e.radius_equator, 0.0, 0.0);
        assert!(intersect_with_ellipsoid(&e, start, end).is_none());
    }
}
