//! Budgeted LRU cache over resident octree nodes.
//!
//! Recency is a doubly linked list whose links are indices into a slot
//! table, never references, so move-to-tail and removal stay O(1) without
//! ownership cycles. The cache tracks the exact resident point total and
//! evicts least-recently-touched subtrees once usage exceeds twice the
//! configured budget; the 2x hysteresis tolerates transient overshoot so
//! small excursions don't thrash.

use rustc_hash::FxHashMap;

use pulsar_octree::{NodeId, OctreeNode, SceneHandle};

use crate::point_cloud::PointCloud;

/// Cache identity of a node: the owning cloud's index plus the node id.
type CacheKey = (usize, NodeId);

#[derive(Debug)]
struct Slot {
    cloud: usize,
    node: NodeId,
    num_points: u64,
    /// Toward the least-recent end.
    prev: Option<usize>,
    /// Toward the most-recent end.
    next: Option<usize>,
}

/// What one eviction pass removed.
#[derive(Debug, Default)]
pub struct EvictionReport {
    pub evicted_nodes: usize,
    pub freed_points: u64,
    /// Renderable handles of evicted promoted nodes; the caller must
    /// release these with the rendering collaborator.
    pub released_scene: Vec<SceneHandle>,
}

/// LRU cache of resident nodes with a point-count budget.
pub struct NodeCache {
    slots: Vec<Slot>,
    free: Vec<usize>,
    /// Least recently touched item.
    head: Option<usize>,
    /// Most recently touched item.
    tail: Option<usize>,
    index: FxHashMap<CacheKey, usize>,
    resident_points: u64,
    budget: u64,
}

impl NodeCache {
    pub fn new(budget: u64) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            index: FxHashMap::default(),
            resident_points: 0,
            budget,
        }
    }

    #[must_use]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Change the budget. Takes effect on the next enforcement pass.
    pub fn set_budget(&mut self, budget: u64) {
        self.budget = budget;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Exact sum of `num_points` across cached nodes.
    #[must_use]
    pub fn resident_points(&self) -> u64 {
        self.resident_points
    }

    #[must_use]
    pub fn contains(&self, cloud: usize, node: NodeId) -> bool {
        self.index.contains_key(&(cloud, node))
    }

    /// Cache keys from least to most recently touched. Diagnostics only.
    #[must_use]
    pub fn lru_keys(&self) -> Vec<(usize, NodeId)> {
        let mut keys = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            keys.push((self.slots[slot].cloud, self.slots[slot].node));
            cursor = self.slots[slot].next;
        }
        debug_assert_eq!(keys.len(), self.index.len(), "recency list diverged from index");
        keys
    }

    /// Mark `node` as the most recently used entry.
    ///
    /// No-op unless the node's payload is resident. A node seen for the
    /// first time is inserted at the most-recent position and its points
    /// are added to the resident total; a known node is relinked in O(1).
    pub fn touch(&mut self, cloud: usize, node: &OctreeNode) {
        if !node.is_resident() {
            return;
        }
        let key = (cloud, node.id);
        if let Some(&slot) = self.index.get(&key) {
            self.unlink(slot);
            self.push_tail(slot);
        } else {
            let entry = Slot {
                cloud,
                node: node.id,
                num_points: node.num_points,
                prev: None,
                next: None,
            };
            let slot = match self.free.pop() {
                Some(reused) => {
                    self.slots[reused] = entry;
                    reused
                }
                None => {
                    self.slots.push(entry);
                    self.slots.len() - 1
                }
            };
            self.push_tail(slot);
            self.index.insert(key, slot);
            self.resident_points += node.num_points;
        }
    }

    /// Detach a node from the cache in O(1). Returns false if the node
    /// was not cached; a later `touch` re-inserts it as most recent.
    pub fn remove(&mut self, cloud: usize, node: NodeId) -> bool {
        match self.index.remove(&(cloud, node)) {
            Some(slot) => {
                self.unlink(slot);
                self.resident_points -= self.slots[slot].num_points;
                self.free.push(slot);
                true
            }
            None => false,
        }
    }

    /// Evict least-recently-touched subtrees until resident points drop
    /// to at most twice the budget, or a single item remains.
    ///
    /// Each round takes the current least-recent node, collects it plus
    /// every still-resident descendant, disposes their payloads, and
    /// removes them from the cache. Eviction is strictly oldest-first
    /// regardless of subtree size.
    pub fn enforce_budget(&mut self, clouds: &mut [PointCloud]) -> EvictionReport {
        let mut report = EvictionReport::default();
        while self.resident_points > self.budget.saturating_mul(2) && self.len() > 1 {
            let head = self.head.expect("non-empty cache has a head");
            let cloud_index = self.slots[head].cloud;
            let node_id = self.slots[head].node;
            let octree = clouds[cloud_index]
                .octree
                .as_mut()
                .expect("cached node belongs to an initialized cloud");

            let subtree = octree.collect_resident_subtree(node_id);
            tracing::debug!(
                "evicting subtree at node {} ({} resident nodes)",
                node_id,
                subtree.len()
            );
            for id in subtree {
                if let Some(scene) = octree.dispose(id) {
                    report.released_scene.push(scene);
                }
                let removed = self.remove(cloud_index, id);
                debug_assert!(removed, "resident node {id} missing from cache");
                if removed {
                    report.evicted_nodes += 1;
                    report.freed_points += octree.node(id).num_points;
                }
            }
        }
        report
    }

    /// Explicit eviction pass, callable any time (e.g. after manual node
    /// removal or a budget change).
    pub fn free_memory(&mut self, clouds: &mut [PointCloud]) -> EvictionReport {
        self.enforce_budget(clouds)
    }

    fn unlink(&mut self, slot: usize) {
        let prev = self.slots[slot].prev;
        let next = self.slots[slot].next;
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[slot].prev = None;
        self.slots[slot].next = None;
    }

    fn push_tail(&mut self, slot: usize) {
        self.slots[slot].prev = self.tail;
        self.slots[slot].next = None;
        match self.tail {
            Some(t) => self.slots[t].next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
    }
}
