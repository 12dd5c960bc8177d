use glam::{DMat4, DVec3};

/// Minimal enclosing-sphere culling primitive.
///
/// A negative radius marks an invalid/empty sphere; invalid operands pass
/// through expansion without corrupting a valid one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl Default for BoundingSphere {
    fn default() -> Self {
        Self {
            center: DVec3::ZERO,
            radius: -1.0,
        }
    }
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn valid(&self) -> bool {
        self.radius >= 0.0
    }

    pub fn radius_squared(&self) -> f64 {
        self.radius * self.radius
    }

    /// Grow the sphere minimally to include `point`, recentering only when
    /// the point lies outside the current radius. Incremental growth, not a
    /// minimal refit.
    pub fn expand_by_point(&mut self, point: DVec3) {
        if !self.valid() {
            self.center = point;
            self.radius = 0.0;
            return;
        }

        let d = (point - self.center).length();
        if d > self.radius {
            let new_radius = (self.radius + d) * 0.5;
            let ratio = (new_radius - self.radius) / d;
            self.center += (point - self.center) * ratio;
            self.radius = new_radius;
        }
    }

    /// Grow the sphere minimally to include `other`, using center distance
    /// plus the other's radius.
    pub fn expand_by_bounding_sphere(&mut self, other: &BoundingSphere) {
        if !other.valid() {
            return;
        }
        if !self.valid() {
            *self = *other;
            return;
        }

        let d = (other.center - self.center).length();
        if d + other.radius <= self.radius {
            return;
        }
        if d + self.radius <= other.radius {
            *self = *other;
            return;
        }

        let new_radius = (self.radius + d + other.radius) * 0.5;
        let ratio = (new_radius - self.radius) / d;
        self.center += (other.center - self.center) * ratio;
        self.radius = new_radius;
    }

    /// Boundary inclusive.
    pub fn contains(&self, point: DVec3) -> bool {
        self.valid() && (point - self.center).length_squared() <= self.radius_squared()
    }

    /// Boundary inclusive.
    pub fn intersects_bounding_sphere(&self, other: &BoundingSphere) -> bool {
        if !self.valid() || !other.valid() {
            return false;
        }
        let sum = self.radius + other.radius;
        (other.center - self.center).length_squared() <= sum * sum
    }

    /// Map the center by the full transform and scale the radius by the
    /// transform's maximum axis scale, a conservative bound.
    pub fn transform(&self, matrix: &DMat4) -> BoundingSphere {
        if !self.valid() {
            return *self;
        }
        let x_scale = matrix.x_axis.truncate().length();
        let y_scale = matrix.y_axis.truncate().length();
        let z_scale = matrix.z_axis.truncate().length();
        let max_scale = x_scale.max(y_scale).max(z_scale);
        BoundingSphere {
            center: matrix.transform_point3(self.center),
            radius: self.radius * max_scale,
        }
    }
}
