// Re-export glam for convenience
pub use glam::*;

// TPM pose helpers
mod transform;
pub use transform::{euler_degrees_matrix, pose_matrix, reflect_across_plane, triangle_normal};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_creation() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_vec2_creation() {
        let uv = Vec2::new(0.25, 0.75);
        assert_eq!(uv.x, 0.25);
        assert_eq!(uv.y, 0.75);
    }
}
