//! Arena-backed octree.
//!
//! Nodes live in a flat table indexed by [`NodeId`]; child and parent links
//! are ids, never references, so recency lists and traversal state elsewhere
//! can hold plain indices without ownership cycles. Nodes are created by the
//! metadata-loading collaborator as the hierarchy is parsed; eviction only
//! drops payloads, so table slots are never freed.

use pulsar_math::Aabb;

use crate::node::{NodeId, OctreeNode, SceneHandle};

/// Metadata for one node, known before its payload is fetched.
#[derive(Clone, Copy, Debug)]
pub struct NodeMeta {
    pub num_points: u64,
    pub bounding_box: Aabb,
}

/// A point cloud's octree hierarchy.
#[derive(Debug)]
pub struct Octree {
    nodes: Vec<OctreeNode>,
    root: NodeId,
}

impl Octree {
    /// Create an octree containing only the root node.
    pub fn new(root: NodeMeta) -> Self {
        let root_id = NodeId(0);
        Self {
            nodes: vec![OctreeNode::new(
                root_id,
                root.num_points,
                0,
                root.bounding_box,
                None,
            )],
            root: root_id,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> &OctreeNode {
        self.node(self.root)
    }

    /// Look up a node by id.
    ///
    /// # Panics
    /// Panics on an id not issued by this octree; that is a caller bug,
    /// since ids are only ever created by [`Octree::add_child`].
    pub fn node(&self, id: NodeId) -> &OctreeNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut OctreeNode {
        &mut self.nodes[id.0 as usize]
    }

    /// Number of nodes in the hierarchy.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a child into the given octant slot of `parent`.
    ///
    /// # Panics
    /// Panics if the slot is already occupied or `octant >= 8`.
    pub fn add_child(&mut self, parent: NodeId, octant: usize, meta: NodeMeta) -> NodeId {
        assert!(octant < 8, "octant index out of range: {octant}");
        assert!(
            self.node(parent).children[octant].is_none(),
            "octant {octant} of node {parent} already occupied"
        );
        let id = NodeId(self.nodes.len() as u32);
        let level = self.node(parent).level + 1;
        self.nodes.push(OctreeNode::new(
            id,
            meta.num_points,
            level,
            meta.bounding_box,
            Some(parent),
        ));
        self.node_mut(parent).children[octant] = Some(id);
        id
    }

    /// Depth-first visit of `from` and all of its descendants.
    pub fn traverse(&self, from: NodeId, visit: &mut impl FnMut(&OctreeNode)) {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            visit(node);
            for child in node.children.iter().rev().flatten() {
                stack.push(*child);
            }
        }
    }

    /// Collect `from` plus every descendant whose payload is resident.
    /// This is the unit the cache evicts: a subtree's worth of points.
    pub fn collect_resident_subtree(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.traverse(from, &mut |node| {
            if node.is_resident() {
                out.push(node.id);
            }
        });
        out
    }

    /// Dispose a node's payload (see [`OctreeNode::dispose`]), returning
    /// the scene handle to release, if it was promoted.
    pub fn dispose(&mut self, id: NodeId) -> Option<SceneHandle> {
        self.node_mut(id).dispose()
    }
}
