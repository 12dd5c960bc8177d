pub mod bounding_sphere;
pub mod camera;
pub mod coord;
pub mod ellipsoid;
pub mod intersection_tests;
pub mod math;
pub mod rectangle;
pub mod web_mercator;

pub use bounding_sphere::BoundingSphere;
pub use camera::{Camera, Viewport};
pub use coord::Geodetic;
pub use ellipsoid::Ellipsoid;
pub use intersection_tests::intersect_with_ellipsoid;
pub use rectangle::Rectangle;
