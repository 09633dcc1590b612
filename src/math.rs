/*
 * Math Module
 *
 * Small vector helpers shared by the vehicle, path and flock code.
 * All vectors are glam `Vec3` with Y as the vertical axis; headings live
 * mostly in the horizontal XZ plane.
 */

use glam::{Quat, Vec3};

// Vertical component limit applied to the heading of airborne vehicles
pub const MAX_VERTICAL_HEADING: f32 = 0.9;

// Right-hand side of a heading, flattened to the ground plane.
// Falls back to +X when the heading is (nearly) vertical.
#[inline]
pub fn right_of(forward: Vec3) -> Vec3 {
    let right = Vec3::Y.cross(forward);
    if right.length_squared() <= f32::EPSILON {
        return Vec3::X;
    }
    right.normalize()
}

// Rotate a vector around the vertical axis by an angle in degrees
#[inline]
pub fn rotate_y_degrees(v: Vec3, degrees: f32) -> Vec3 {
    Quat::from_rotation_y(degrees.to_radians()) * v
}

/// Folds a wander angle back into `[-90, 90]` degrees.
///
/// The accumulator only moves a few degrees per tick, so a single fold is
/// enough to keep it inside the range.
pub fn wrap_wander_angle(angle: f32) -> f32 {
    if angle > 90.0 {
        angle - 180.0
    } else if angle < -90.0 {
        angle + 180.0
    } else {
        angle
    }
}

// Flip negative configuration values; zero is replaced by `fallback`
#[inline]
pub fn sanitize_non_zero(value: f32, fallback: f32) -> f32 {
    if value == 0.0 || !value.is_finite() {
        fallback
    } else {
        value.abs()
    }
}

// Flip negative configuration values, keeping zero
#[inline]
pub fn sanitize_non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.abs()
    } else {
        0.0
    }
}

// Limit the vertical component of a heading and renormalize it
pub fn limit_vertical_heading(direction: Vec3) -> Vec3 {
    let mut limited = direction;
    limited.y = limited.y.clamp(-MAX_VERTICAL_HEADING, MAX_VERTICAL_HEADING);
    limited.normalize_or_zero()
}
