use glam::DVec3;

use crate::Aabb;

/// Bounding sphere in f64 octree-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        debug_assert!(radius >= 0.0, "radius must be non-negative");
        Self { center, radius }
    }

    /// The tightest sphere enclosing the given box: centered on the box
    /// center with half the diagonal as radius.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.center(),
            radius: aabb.size().length() * 0.5,
        }
    }

    /// Returns true if the point lies inside or on the sphere surface.
    pub fn contains_point(&self, p: DVec3) -> bool {
        self.center.distance_squared(p) <= self.radius * self.radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A sphere from a unit cube has radius sqrt(3)/2 around the center.
    #[test]
    fn test_from_aabb() {
        let b = Aabb::new(DVec3::ZERO, DVec3::splat(1.0));
        let s = BoundingSphere::from_aabb(&b);
        assert_eq!(s.center, DVec3::splat(0.5));
        assert!((s.radius - (3.0f64).sqrt() * 0.5).abs() < 1e-12);
        // Every cube corner lies on the sphere surface.
        assert!(s.contains_point(DVec3::ZERO));
        assert!(s.contains_point(DVec3::splat(1.0)));
    }

    /// Points beyond the radius are outside.
    #[test]
    fn test_contains_point() {
        let s = BoundingSphere::new(DVec3::ZERO, 2.0);
        assert!(s.contains_point(DVec3::new(2.0, 0.0, 0.0)));
        assert!(!s.contains_point(DVec3::new(2.0, 0.1, 0.0)));
    }
}
