//! Interface toward the rendering collaborator.

use pulsar_octree::{OctreeNode, SceneHandle};

/// Implemented by the rendering backend. The scheduler drives it; all GPU
/// resource management stays on the implementor's side of the boundary.
pub trait SceneAdapter {
    /// Build a renderable representation for a loaded node, attached under
    /// `parent` when the node is not a root. The returned handle is the
    /// core's only reference to the renderable.
    fn promote(&mut self, cloud: usize, node: &OctreeNode, parent: Option<SceneHandle>)
    -> SceneHandle;

    /// Show or hide a promoted node's renderable.
    fn set_visible(&mut self, handle: SceneHandle, visible: bool);

    /// Toggle the bounding-box visualization for a promoted node.
    fn set_bounding_box_visible(&mut self, handle: SceneHandle, visible: bool);

    /// Release a renderable whose node was evicted. The handle is dead
    /// after this call.
    fn release(&mut self, handle: SceneHandle);
}
