use glam::{DMat4, DVec3, DVec4};

use crate::bounding_sphere::BoundingSphere;

/// Smallest near-plane distance handed to the projection; keeps the matrix
/// non-degenerate when the camera sits inside the bounds it is framing.
const NEAR_EPSILON: f64 = 1e-2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// View/projection state with lazily memoized derived matrices.
///
/// The projection matrix and the six frustum side planes are recomputed at
/// most once per mutation burst: every setter invalidates the cache and the
/// next getter rebuilds it.
#[derive(Debug, Clone)]
pub struct Camera {
    model_view: DMat4,
    viewport: Viewport,
    fovy: f64,
    near: f64,
    far: f64,
    projection: Option<DMat4>,
    frustum_planes: Option<[DVec4; 6]>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            model_view: DMat4::IDENTITY,
            viewport: Viewport::new(1024.0, 768.0),
            fovy: 60f64.to_radians(),
            near: 0.1,
            far: 1.0e8,
            projection: None,
            frustum_planes: None,
        }
    }
}

impl Camera {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            ..Default::default()
        }
    }

    pub fn model_view(&self) -> DMat4 {
        self.model_view
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Vertical field of view in radians.
    pub fn fovy(&self) -> f64 {
        self.fovy
    }

    pub fn aspect(&self) -> f64 {
        self.viewport.width / self.viewport.height
    }

    pub fn set_model_view(&mut self, model_view: DMat4) {
        self.model_view = model_view;
        self.invalidate();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.invalidate();
    }

    pub fn set_fovy(&mut self, fovy: f64) {
        self.fovy = fovy;
        self.invalidate();
    }

    pub fn set_near_far(&mut self, near: f64, far: f64) {
        self.near = near.max(NEAR_EPSILON);
        self.far = far.max(self.near + NEAR_EPSILON);
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.projection = None;
        self.frustum_planes = None;
    }

    /// Camera position in world coordinates, from the inverse model-view.
    pub fn eye(&self) -> DVec3 {
        self.model_view.inverse().w_axis.truncate()
    }

    /// Unit view direction in world coordinates (camera looks down -Z).
    pub fn view_direction(&self) -> DVec3 {
        let inv = self.model_view.inverse();
        -inv.z_axis.truncate().normalize()
    }

    pub fn projection(&mut self) -> DMat4 {
        if self.projection.is_none() {
            self.projection = Some(DMat4::perspective_rh(
                self.fovy,
                self.aspect(),
                self.near,
                self.far,
            ));
        }
        self.projection.unwrap()
    }

    pub fn view_projection(&mut self) -> DMat4 {
        self.projection() * self.model_view
    }

    /// Adapt field of view and near/far so `bound` is fully enclosed with
    /// the tightest usable near plane. When the camera sits inside the
    /// sphere the near plane clamps to a small positive epsilon instead of
    /// degenerating.
    pub fn calculate_projection_for_bounds(&mut self, bound: &BoundingSphere) {
        if !bound.valid() {
            return;
        }
        let distance = (bound.center - self.eye()).length();

        if distance > bound.radius {
            // Tightest cone that still encloses the sphere.
            let half_angle = (bound.radius / distance).asin();
            self.fovy = (2.0 * half_angle).min(120f64.to_radians());
            self.near = (distance - bound.radius).max(NEAR_EPSILON);
        } else {
            self.near = NEAR_EPSILON;
        }
        self.far = distance + bound.radius;
        self.invalidate();
    }

    /// The six frustum planes of the current view-projection, as
    /// `(normal, d)` with the normal xyz-normalized and pointing inward.
    pub fn frustum_planes(&mut self) -> [DVec4; 6] {
        if self.frustum_planes.is_none() {
            let m = self.view_projection();
            let r0 = m.row(0);
            let r1 = m.row(1);
            let r2 = m.row(2);
            let r3 = m.row(3);
            let planes = [
                r3 + r0, // left
                r3 - r0, // right
                r3 + r1, // bottom
                r3 - r1, // top
                r3 + r2, // near
                r3 - r2, // far
            ];
            self.frustum_planes = Some(planes.map(|p| {
                let len = p.truncate().length();
                p / len
            }));
        }
        self.frustum_planes.unwrap()
    }

    /// Conservative sphere/frustum test: rejects only when the sphere lies
    /// beyond a plane by more than its radius. False positives accepted,
    /// false negatives never.
    pub fn is_sphere_visible(&mut self, bound: &BoundingSphere) -> bool {
        if !bound.valid() {
            return false;
        }
        let center = bound.center.extend(1.0);
        for plane in self.frustum_planes() {
            if plane.dot(center) < -bound.radius {
                return false;
            }
        }
        true
    }
}
