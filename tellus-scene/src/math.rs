pub const EPSILON6: f64 = 1e-6;
pub const EPSILON10: f64 = 1e-10;
pub const EPSILON14: f64 = 1e-14;

/// Latitude is capped to the poles, never wrapped.
pub fn normalize_latitude(deg: f64) -> f64 {
    deg.clamp(-90.0, 90.0)
}

/// Longitude wraps around into (-180, 180].
pub fn normalize_longitude(deg: f64) -> f64 {
    let mut deg = deg;
    while deg <= -180.0 {
        deg += 360.0;
    }
    while deg > 180.0 {
        deg -= 360.0;
    }
    deg
}

pub fn equals_epsilon(left: f64, right: f64, epsilon: f64) -> bool {
    (left - right).abs() <= epsilon
}
