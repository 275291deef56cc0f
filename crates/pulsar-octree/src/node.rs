//! Octree node with an explicit load-state machine.
//!
//! A node starts `Unloaded` (metadata only), becomes `Loading` once a fetch
//! is in flight, `Loaded` when its payload arrives, and `Promoted` when the
//! rendering collaborator has built a renderable representation for it.
//! `Failed` is terminal. Eviction resets `Loaded`/`Promoted` back to
//! `Unloaded` and bumps the node's load epoch so that a completion from a
//! superseded fetch is recognizably stale.

use pulsar_math::{Aabb, BoundingSphere};

/// Stable index of a node within its owning octree's node table.
/// Unique within one point cloud.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle to a renderable representation owned by the rendering
/// collaborator. The core only stores it and hands it back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub u64);

/// Decoded point payload delivered by the loading collaborator.
#[derive(Clone, Debug, Default)]
pub struct PointData {
    /// Point positions relative to the node's bounding box origin.
    pub positions: Vec<[f32; 3]>,
    /// Per-point RGBA colors; empty when the source carries no color.
    pub colors: Vec<[u8; 4]>,
}

impl PointData {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Load state of a node. Transitions are one-directional
/// (Unloaded -> Loading -> Loaded -> Promoted) except for disposal,
/// which returns a resident node to `Unloaded`. `Failed` is terminal.
#[derive(Debug, Default)]
pub enum NodeState {
    #[default]
    Unloaded,
    Loading,
    Loaded {
        points: PointData,
    },
    Promoted {
        points: PointData,
        scene: SceneHandle,
    },
    Failed,
}

/// A single octree node: spatial extent, point count, child links, and
/// load state. Nodes are created from metadata long before their payload
/// is fetched.
#[derive(Debug)]
pub struct OctreeNode {
    pub id: NodeId,
    /// Point count advertised by the metadata, known before loading.
    pub num_points: u64,
    /// Depth from the root (root = 0).
    pub level: u32,
    pub bounding_box: Aabb,
    pub bounding_sphere: BoundingSphere,
    /// Fixed-size ordered child slots; absent slots are empty.
    pub children: [Option<NodeId>; 8],
    pub parent: Option<NodeId>,
    state: NodeState,
    load_epoch: u32,
}

impl OctreeNode {
    pub(crate) fn new(
        id: NodeId,
        num_points: u64,
        level: u32,
        bounding_box: Aabb,
        parent: Option<NodeId>,
    ) -> Self {
        Self {
            id,
            num_points,
            level,
            bounding_box,
            bounding_sphere: BoundingSphere::from_aabb(&bounding_box),
            children: [None; 8],
            parent,
            state: NodeState::Unloaded,
            load_epoch: 0,
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// True while the node's payload is resident (loaded or promoted).
    pub fn is_resident(&self) -> bool {
        matches!(
            self.state,
            NodeState::Loaded { .. } | NodeState::Promoted { .. }
        )
    }

    pub fn is_promoted(&self) -> bool {
        matches!(self.state, NodeState::Promoted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, NodeState::Failed)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, NodeState::Loading)
    }

    pub fn is_unloaded(&self) -> bool {
        matches!(self.state, NodeState::Unloaded)
    }

    /// The renderable handle, if this node has been promoted.
    pub fn scene_handle(&self) -> Option<SceneHandle> {
        match self.state {
            NodeState::Promoted { scene, .. } => Some(scene),
            _ => None,
        }
    }

    /// The resident payload, if any.
    pub fn points(&self) -> Option<&PointData> {
        match &self.state {
            NodeState::Loaded { points } | NodeState::Promoted { points, .. } => Some(points),
            _ => None,
        }
    }

    /// Epoch of the current metadata incarnation; completions carrying an
    /// older epoch refer to a disposed payload and must be dropped.
    pub fn load_epoch(&self) -> u32 {
        self.load_epoch
    }

    /// Mark a fetch as in flight.
    ///
    /// # Panics
    /// Panics if the node is not `Unloaded`; requesting a load twice or on
    /// a resident node is a scheduler bug.
    pub fn begin_loading(&mut self) {
        assert!(
            self.is_unloaded(),
            "begin_loading on node {} in state {:?}",
            self.id,
            self.state
        );
        self.state = NodeState::Loading;
    }

    /// Install a fetched payload, making the node resident.
    pub fn complete_load(&mut self, points: PointData) {
        debug_assert!(
            !self.is_resident(),
            "complete_load on already-resident node {}",
            self.id
        );
        self.state = NodeState::Loaded { points };
    }

    /// Record an unrecoverable load failure. Terminal.
    pub fn fail_load(&mut self) {
        self.state = NodeState::Failed;
    }

    /// Attach a renderable representation to a loaded node.
    ///
    /// # Panics
    /// Panics unless the node is `Loaded`; a renderable node must own a
    /// resident payload.
    pub fn promote(&mut self, scene: SceneHandle) {
        match std::mem::take(&mut self.state) {
            NodeState::Loaded { points } => {
                self.state = NodeState::Promoted { points, scene };
            }
            other => {
                panic!("promote on node {} in state {other:?}", self.id);
            }
        }
    }

    /// Release the payload (and scene handle, if promoted), returning the
    /// node to `Unloaded` and invalidating any in-flight fetch via an epoch
    /// bump. Idempotent; a failed node stays failed.
    ///
    /// Returns the scene handle the caller must release with the renderer.
    pub fn dispose(&mut self) -> Option<SceneHandle> {
        let scene = match std::mem::take(&mut self.state) {
            NodeState::Promoted { scene, .. } => Some(scene),
            NodeState::Failed => {
                self.state = NodeState::Failed;
                return None;
            }
            _ => None,
        };
        self.load_epoch = self.load_epoch.wrapping_add(1);
        scene
    }
}
