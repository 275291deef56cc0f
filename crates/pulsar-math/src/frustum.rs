use glam::{DMat4, DVec3, DVec4};

use crate::Aabb;

/// A plane in Hessian normal form: `normal . p + d = 0`.
///
/// Points with positive signed distance lie on the inside halfspace.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: DVec3,
    pub d: f64,
}

impl Plane {
    /// Build a normalized plane from raw `(a, b, c, d)` coefficients.
    pub fn from_coefficients(v: DVec4) -> Self {
        let normal = DVec3::new(v.x, v.y, v.z);
        let len = normal.length();
        debug_assert!(len > 0.0, "degenerate plane");
        Self {
            normal: normal / len,
            d: v.w / len,
        }
    }

    /// Signed distance from the point to the plane.
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.d
    }
}

/// View frustum as six inward-facing planes, extracted from a combined
/// projection * view (* model) matrix.
///
/// Plane extraction follows the Gribb-Hartmann row method; the near/far
/// planes assume a 0..1 clip-space depth range (wgpu convention).
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from `m`. Passing `proj * view * model`
    /// yields planes in model-local space, which is how the visibility
    /// walk culls octree nodes without transforming their boxes.
    pub fn from_matrix(m: &DMat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r2),      // near (z >= 0)
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Returns true if the point is inside or on every plane.
    pub fn contains_point(&self, p: DVec3) -> bool {
        self.planes.iter().all(|pl| pl.signed_distance(p) >= 0.0)
    }

    /// Conservative box/frustum test using the p-vertex per plane.
    ///
    /// Returns false only when the box is fully outside at least one
    /// plane; boxes near frustum corners can report a false positive,
    /// which is acceptable for culling.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let p = aabb.farthest_corner(plane.normal);
            plane.signed_distance(p) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look_down_z() -> Frustum {
        // Camera at origin looking down -Z, 90 degree vertical fov.
        let proj = DMat4::perspective_rh(std::f64::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = DMat4::look_at_rh(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);
        Frustum::from_matrix(&(proj * view))
    }

    /// A point straight ahead is inside; behind the camera is outside.
    #[test]
    fn test_contains_point_ahead_not_behind() {
        let f = look_down_z();
        assert!(f.contains_point(DVec3::new(0.0, 0.0, -10.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, 10.0)));
    }

    /// Points outside the near and far planes are rejected.
    #[test]
    fn test_near_far_rejection() {
        let f = look_down_z();
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -0.01)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -200.0)));
    }

    /// A box straddling a side plane still intersects the frustum.
    #[test]
    fn test_straddling_box_intersects() {
        let f = look_down_z();
        // At z = -10 with fov 90, the frustum half-width is 10.
        let straddling = Aabb::new(DVec3::new(8.0, -1.0, -11.0), DVec3::new(14.0, 1.0, -9.0));
        assert!(f.intersects_aabb(&straddling));
    }

    /// A box fully off to the side is culled.
    #[test]
    fn test_outside_box_rejected() {
        let f = look_down_z();
        let outside = Aabb::new(DVec3::new(50.0, -1.0, -11.0), DVec3::new(60.0, 1.0, -9.0));
        assert!(!f.intersects_aabb(&outside));
        let behind = Aabb::new(DVec3::new(-1.0, -1.0, 5.0), DVec3::new(1.0, 1.0, 6.0));
        assert!(!f.intersects_aabb(&behind));
    }

    /// A model matrix moves the planes into model-local space.
    #[test]
    fn test_model_matrix_localizes_planes() {
        let proj = DMat4::perspective_rh(std::f64::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = DMat4::look_at_rh(DVec3::ZERO, DVec3::NEG_Z, DVec3::Y);
        // Model space shifted 1000 units along +X in world space.
        let model = DMat4::from_translation(DVec3::new(1000.0, 0.0, 0.0));
        let f = Frustum::from_matrix(&(proj * view * model));
        // Local (-1000, 0, -10) is world (0, 0, -10): visible.
        assert!(f.contains_point(DVec3::new(-1000.0, 0.0, -10.0)));
        assert!(!f.contains_point(DVec3::new(0.0, 0.0, -10.0)));
    }
}
