//! Per-cloud state: the octree, LOD parameters, clip configuration, and
//! the scratch fields the scheduler rewrites every frame.

use glam::DMat4;
use pulsar_config::DisplayConfig;
use pulsar_math::Aabb;
use pulsar_octree::{NodeId, Octree};

/// How clip volumes constrain visibility.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipMode {
    /// Clip volumes are ignored.
    #[default]
    Disabled,
    /// Everything outside all clip boxes is culled; a node survives if it
    /// intersects at least one box.
    Outside,
}

/// One point cloud under the scheduler's management.
///
/// The caller owns this and configures the parameter fields; the scheduler
/// reads them and rewrites only the scratch fields (and node load state)
/// each frame. Cloud list indices are used as cache keys, so the list must
/// stay stable across frames; call the scheduler's `free_memory` before
/// reordering or removing clouds.
pub struct PointCloud {
    /// The hierarchy, once the metadata collaborator has delivered it.
    /// `None` means the cloud is not yet initialized and is skipped.
    pub octree: Option<Octree>,
    /// Local-to-world transform of the octree.
    pub world: DMat4,
    pub visible: bool,
    /// Nodes projecting smaller than this many pixels are not refined.
    pub min_node_pixel_size: f64,
    /// Nodes deeper than this are never shown.
    pub max_level: u32,
    pub clip_mode: ClipMode,
    /// Inclusion volumes in cloud-local space.
    pub clip_boxes: Vec<Aabb>,
    pub show_bounding_boxes: bool,

    // Per-frame scratch, rewritten by the scheduler.
    /// Promoted nodes shown this frame.
    pub visible_nodes: Vec<NodeId>,
    /// Nodes selected this frame whose renderable does not exist yet.
    pub visible_geometry: Vec<NodeId>,
    /// Points accepted for this cloud this frame.
    pub num_visible_points: u64,
}

impl PointCloud {
    /// A cloud with default LOD parameters around an existing hierarchy.
    pub fn new(octree: Octree) -> Self {
        Self {
            octree: Some(octree),
            ..Self::uninitialized()
        }
    }

    /// A cloud whose metadata has not arrived yet. The scheduler skips it
    /// until `octree` is set.
    pub fn uninitialized() -> Self {
        Self {
            octree: None,
            world: DMat4::IDENTITY,
            visible: true,
            min_node_pixel_size: 100.0,
            max_level: u32::MAX,
            clip_mode: ClipMode::Disabled,
            clip_boxes: Vec::new(),
            show_bounding_boxes: false,
            visible_nodes: Vec::new(),
            visible_geometry: Vec::new(),
            num_visible_points: 0,
        }
    }

    /// A cloud with display parameters taken from configuration.
    pub fn from_config(octree: Octree, display: &DisplayConfig) -> Self {
        Self {
            min_node_pixel_size: display.min_node_pixel_size,
            show_bounding_boxes: display.show_bounding_boxes,
            ..Self::new(octree)
        }
    }

    /// True when the box survives the clip configuration. Only applies
    /// with `ClipMode::Outside` and at least one clip box; a node is
    /// culled only if it misses every box.
    pub(crate) fn clip_test(&self, aabb: &Aabb) -> bool {
        if self.clip_mode != ClipMode::Outside || self.clip_boxes.is_empty() {
            return true;
        }
        self.clip_boxes.iter().any(|clip| clip.intersects(aabb))
    }

    pub(crate) fn reset_frame_state(&mut self) {
        self.visible_nodes.clear();
        self.visible_geometry.clear();
        self.num_visible_points = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn unit_box(min: f64, max: f64) -> Aabb {
        Aabb::new(DVec3::splat(min), DVec3::splat(max))
    }

    /// With clipping disabled every box passes, clip boxes or not.
    #[test]
    fn test_clip_disabled_passes_everything() {
        let mut cloud = PointCloud::uninitialized();
        cloud.clip_boxes.push(unit_box(100.0, 101.0));
        assert!(cloud.clip_test(&unit_box(0.0, 1.0)));
    }

    /// Outside mode with no boxes configured is inactive.
    #[test]
    fn test_clip_outside_without_boxes_is_inactive() {
        let mut cloud = PointCloud::uninitialized();
        cloud.clip_mode = ClipMode::Outside;
        assert!(cloud.clip_test(&unit_box(0.0, 1.0)));
    }

    /// A node survives if it intersects any box, and is culled only when
    /// it misses all of them.
    #[test]
    fn test_clip_outside_requires_one_intersection() {
        let mut cloud = PointCloud::uninitialized();
        cloud.clip_mode = ClipMode::Outside;
        cloud.clip_boxes.push(unit_box(0.0, 1.0));
        cloud.clip_boxes.push(unit_box(10.0, 11.0));

        assert!(cloud.clip_test(&unit_box(0.5, 2.0)), "hits first box");
        assert!(cloud.clip_test(&unit_box(10.5, 12.0)), "hits second box");
        assert!(!cloud.clip_test(&unit_box(4.0, 5.0)), "misses both");
    }
}
