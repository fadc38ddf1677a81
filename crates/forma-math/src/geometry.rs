//! Bar geometry helpers.
//!
//! Angles are always computed between bar direction vectors
//! (`right - left`), so callers never need to worry about which endpoint
//! a spring stores first.

use glam::{DMat3, DVec3};

/// Angle between two bar vectors, in radians, in `[0, π]`.
///
/// Degenerate (zero-length) inputs return π/2 so they are neither
/// "acute" nor "parallel" to anything.
pub fn angle_between(a: DVec3, b: DVec3) -> f64 {
    let denom = a.length() * b.length();
    if denom == 0.0 {
        return std::f64::consts::FRAC_PI_2;
    }
    (a.dot(b) / denom).clamp(-1.0, 1.0).acos()
}

/// True if the angle between two bars is strictly acute.
pub fn is_acute(a: DVec3, b: DVec3) -> bool {
    angle_between(a, b) < std::f64::consts::FRAC_PI_2
}

/// Midpoint of the segment between two positions.
pub fn bisect(a: DVec3, b: DVec3) -> DVec3 {
    0.5 * (a + b)
}

/// Axis-aligned bounds test, inclusive of the min corner and exclusive
/// of the max corner.
pub fn in_bounds(p: DVec3, min: DVec3, max: DVec3) -> bool {
    p.x >= min.x && p.x < max.x && p.y >= min.y && p.y < max.y && p.z >= min.z && p.z < max.z
}

/// Rotate `p` about `center` by Euler angles applied X, then Y, then Z.
///
/// `turns` is expressed in full revolutions per axis; a repeat rotation of
/// `(0.25, 0, 0)` turns the structure a quarter revolution about X.
pub fn rotate_about(p: DVec3, center: DVec3, turns: DVec3) -> DVec3 {
    let tau = std::f64::consts::TAU;
    let rot = DMat3::from_rotation_z(turns.z * tau)
        * DMat3::from_rotation_y(turns.y * tau)
        * DMat3::from_rotation_x(turns.x * tau);
    rot * (p - center) + center
}
