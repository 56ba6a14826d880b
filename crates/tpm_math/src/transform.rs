// Static pose utilities for TPM instances and bones
//
// TPM stores rotations as Euler angles in degrees, applied X first, then Y,
// then Z, and scales uniformly.

use glam::{Mat4, Vec3};

/// Rotation matrix for Euler angles in degrees, applied X then Y then Z.
///
/// Each rotation is about the fixed world axes, so the composed matrix is
/// `Rz * Ry * Rx`.
pub fn euler_degrees_matrix(rotation: Vec3) -> Mat4 {
    Mat4::from_rotation_z(rotation.z.to_radians())
        * Mat4::from_rotation_y(rotation.y.to_radians())
        * Mat4::from_rotation_x(rotation.x.to_radians())
}

/// Model matrix for a position, Euler rotation (degrees) and uniform scale.
///
/// Order: Scale -> Rotate -> Translate
pub fn pose_matrix(position: Vec3, rotation: Vec3, scale: f32) -> Mat4 {
    Mat4::from_translation(position)
        * euler_degrees_matrix(rotation)
        * Mat4::from_scale(Vec3::splat(scale))
}

/// Unit normal of a counter-clockwise triangle, or `None` if it is degenerate.
pub fn triangle_normal(a: Vec3, b: Vec3, c: Vec3) -> Option<Vec3> {
    (b - a).cross(c - a).try_normalize()
}

/// Reflect `v` across the plane whose normal is `plane_normal`.
///
/// The component of `v` along the plane normal is negated; `plane_normal`
/// must be unit length.
pub fn reflect_across_plane(v: Vec3, plane_normal: Vec3) -> Vec3 {
    v - 2.0 * v.dot(plane_normal) * plane_normal
}
