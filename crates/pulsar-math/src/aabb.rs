use glam::DVec3;

/// Axis-aligned bounding box in f64 octree-local space.
///
/// Invariant: min.x <= max.x, min.y <= max.y, min.z <= max.z.
/// The constructor enforces this by swapping components if needed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Create an AABB from two corners. Automatically sorts
    /// components so that min <= max on every axis.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create an AABB from a center point and half-extents.
    pub fn from_center_half_extents(center: DVec3, half: DVec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Returns true if the point lies inside or on the boundary.
    pub fn contains_point(&self, p: DVec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Returns true if this AABB overlaps with other
    /// (including touching edges/faces).
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Returns the center point of the AABB.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the edge lengths along each axis.
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// The corner of the box farthest along the given direction.
    ///
    /// Used by the frustum test to pick the p-vertex for each plane.
    pub fn farthest_corner(&self, direction: DVec3) -> DVec3 {
        DVec3::new(
            if direction.x >= 0.0 { self.max.x } else { self.min.x },
            if direction.y >= 0.0 { self.max.y } else { self.min.y },
            if direction.z >= 0.0 { self.max.z } else { self.min.z },
        )
    }

    /// The child octant box for slot `index` (0..8), splitting at the center.
    ///
    /// Bit 0 selects the x half, bit 1 the y half, bit 2 the z half.
    pub fn child_octant(&self, index: usize) -> Aabb {
        debug_assert!(index < 8, "octant index out of range: {index}");
        let c = self.center();
        let min = DVec3::new(
            if index & 1 == 0 { self.min.x } else { c.x },
            if index & 2 == 0 { self.min.y } else { c.y },
            if index & 4 == 0 { self.min.z } else { c.z },
        );
        Aabb::new(min, min + self.size() * 0.5)
    }
}
