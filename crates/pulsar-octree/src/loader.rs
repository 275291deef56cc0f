//! Asynchronous point loading with bounded concurrency.
//!
//! The frame loop stays single-threaded; fetching and decoding payloads is
//! the collaborator's business, running on whatever schedule it likes. The
//! dispatcher hands it a [`LoadRequest`] plus a channel sender, and the
//! collaborator replies with exactly one [`LoadCompletion`] whenever it is
//! done. Completions are drained once per frame, before traversal, so load
//! results land deterministically and never mutate cache or queue state
//! from another thread.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rustc_hash::FxHashSet;

use crate::error::LoadError;
use crate::node::{NodeId, PointData};
use crate::octree::Octree;

/// A request to fetch one node's payload.
#[derive(Clone, Copy, Debug)]
pub struct LoadRequest {
    /// Index of the owning point cloud in the caller's cloud list.
    pub cloud: usize,
    pub node: NodeId,
    /// The node's load epoch at request time. Echoed back in the
    /// completion; a mismatch means the node was disposed in the interim.
    pub epoch: u32,
}

/// The collaborator's reply to a [`LoadRequest`].
#[derive(Debug)]
pub struct LoadCompletion {
    pub cloud: usize,
    pub node: NodeId,
    pub epoch: u32,
    pub result: Result<PointData, LoadError>,
}

/// Fetches and decodes point payloads on its own schedule.
///
/// Implementations must send exactly one completion per request, echoing
/// the request's cloud, node, and epoch. Sending may happen synchronously
/// or from a worker thread; the dispatcher does not care.
pub trait PointSource: Send + Sync {
    fn begin_load(&self, request: LoadRequest, reply: Sender<LoadCompletion>);
}

/// Issues load requests up to a concurrency cap and collects completions.
pub struct LoadDispatcher {
    source: Arc<dyn PointSource>,
    completion_tx: Sender<LoadCompletion>,
    completion_rx: Receiver<LoadCompletion>,
    max_concurrent: usize,
    /// Requests issued but not yet drained (dedup guard).
    in_flight: FxHashSet<(usize, NodeId)>,
}

impl LoadDispatcher {
    pub fn new(source: Arc<dyn PointSource>, max_concurrent: usize) -> Self {
        let (completion_tx, completion_rx) = unbounded();
        Self {
            source,
            completion_tx,
            completion_rx,
            max_concurrent,
            in_flight: FxHashSet::default(),
        }
    }

    /// Number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight.len() < self.max_concurrent
    }

    /// Issue a load for `node` if capacity allows and the node is still
    /// unloaded. Returns true when a request was actually started.
    pub fn request(&mut self, cloud: usize, octree: &mut Octree, node: NodeId) -> bool {
        if !self.has_capacity() {
            return false;
        }
        if !octree.node(node).is_unloaded() || self.in_flight.contains(&(cloud, node)) {
            return false;
        }
        octree.node_mut(node).begin_loading();
        self.in_flight.insert((cloud, node));
        let request = LoadRequest {
            cloud,
            node,
            epoch: octree.node(node).load_epoch(),
        };
        tracing::debug!("requesting load of node {} (cloud {})", node, cloud);
        self.source.begin_load(request, self.completion_tx.clone());
        true
    }

    /// Empty the completion channel. Call once per frame, before traversal.
    pub fn drain_completions(&mut self) -> Vec<LoadCompletion> {
        let mut completions = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.in_flight.remove(&(completion.cloud, completion.node));
            completions.push(completion);
        }
        completions
    }
}

impl Octree {
    /// Apply a drained completion to its node.
    ///
    /// Returns false when the completion is stale (the node was disposed
    /// after the request went out, or the reply is a duplicate); stale
    /// completions are dropped without touching node state.
    pub fn apply_completion(&mut self, completion: LoadCompletion) -> bool {
        let node = self.node_mut(completion.node);
        if completion.epoch != node.load_epoch() || !node.is_loading() {
            tracing::debug!("dropping stale load completion for node {}", completion.node);
            return false;
        }
        match completion.result {
            Ok(points) => {
                if points.len() as u64 != node.num_points {
                    let err = LoadError::PointCountMismatch {
                        expected: node.num_points,
                        actual: points.len() as u64,
                    };
                    tracing::warn!("node {} rejected: {}", completion.node, err);
                    node.fail_load();
                } else {
                    tracing::debug!(
                        "node {} loaded ({} points)",
                        completion.node,
                        node.num_points
                    );
                    node.complete_load(points);
                }
            }
            Err(err) => {
                tracing::warn!("node {} failed to load: {}", completion.node, err);
                node.fail_load();
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::octree::NodeMeta;
    use glam::DVec3;
    use pulsar_math::Aabb;

    /// Replies synchronously with a payload of the requested size, or an
    /// error for nodes listed as broken.
    struct StubSource {
        sizes: Vec<u64>,
        broken: Vec<NodeId>,
    }

    impl PointSource for StubSource {
        fn begin_load(&self, request: LoadRequest, reply: Sender<LoadCompletion>) {
            let result = if self.broken.contains(&request.node) {
                Err(LoadError::Decode("corrupt payload".into()))
            } else {
                let n = self.sizes[request.node.0 as usize] as usize;
                Ok(PointData {
                    positions: vec![[0.0; 3]; n],
                    colors: Vec::new(),
                })
            };
            reply
                .send(LoadCompletion {
                    cloud: request.cloud,
                    node: request.node,
                    epoch: request.epoch,
                    result,
                })
                .unwrap();
        }
    }

    fn tree_with_children(points: &[u64]) -> Octree {
        let root_box = Aabb::new(DVec3::ZERO, DVec3::splat(8.0));
        let mut tree = Octree::new(NodeMeta {
            num_points: points[0],
            bounding_box: root_box,
        });
        for (i, &n) in points.iter().enumerate().skip(1) {
            tree.add_child(
                tree.root_id(),
                i - 1,
                NodeMeta {
                    num_points: n,
                    bounding_box: root_box.child_octant(i - 1),
                },
            );
        }
        tree
    }

    fn dispatcher(sizes: &[u64], broken: Vec<NodeId>, cap: usize) -> LoadDispatcher {
        LoadDispatcher::new(
            Arc::new(StubSource {
                sizes: sizes.to_vec(),
                broken,
            }),
            cap,
        )
    }

    /// Requests beyond the concurrency cap are refused until completions
    /// are drained.
    #[test]
    fn test_concurrency_cap() {
        let sizes = [4, 4, 4, 4];
        let mut tree = tree_with_children(&sizes);
        let mut dispatcher = dispatcher(&sizes, Vec::new(), 2);

        assert!(dispatcher.request(0, &mut tree, NodeId(0)));
        assert!(dispatcher.request(0, &mut tree, NodeId(1)));
        assert!(!dispatcher.request(0, &mut tree, NodeId(2)), "cap is 2");
        assert_eq!(dispatcher.in_flight_count(), 2);

        for completion in dispatcher.drain_completions() {
            assert!(tree.apply_completion(completion));
        }
        assert_eq!(dispatcher.in_flight_count(), 0);
        assert!(dispatcher.request(0, &mut tree, NodeId(2)));
    }

    /// A drained completion makes the node resident with its payload.
    #[test]
    fn test_successful_load() {
        let sizes = [4, 7];
        let mut tree = tree_with_children(&sizes);
        let mut dispatcher = dispatcher(&sizes, Vec::new(), 4);

        assert!(dispatcher.request(0, &mut tree, NodeId(1)));
        assert!(tree.node(NodeId(1)).is_loading());
        for completion in dispatcher.drain_completions() {
            tree.apply_completion(completion);
        }
        let node = tree.node(NodeId(1));
        assert!(node.is_resident());
        assert_eq!(node.points().unwrap().len(), 7);
    }

    /// A source error marks the node failed, terminally.
    #[test]
    fn test_failed_load_is_recorded() {
        let sizes = [4, 7];
        let mut tree = tree_with_children(&sizes);
        let mut dispatcher = dispatcher(&sizes, vec![NodeId(1)], 4);

        dispatcher.request(0, &mut tree, NodeId(1));
        for completion in dispatcher.drain_completions() {
            tree.apply_completion(completion);
        }
        assert!(tree.node(NodeId(1)).is_failed());
        // A failed node is never re-requested.
        assert!(!dispatcher.request(0, &mut tree, NodeId(1)));
    }

    /// A completion whose node was disposed in the interim is dropped:
    /// the epoch no longer matches.
    #[test]
    fn test_stale_completion_dropped_after_dispose() {
        let sizes = [4, 7];
        let mut tree = tree_with_children(&sizes);
        let mut dispatcher = dispatcher(&sizes, Vec::new(), 4);

        dispatcher.request(0, &mut tree, NodeId(1));
        // Evicted before the completion is drained.
        tree.dispose(NodeId(1));

        let completions = dispatcher.drain_completions();
        assert_eq!(completions.len(), 1);
        for completion in completions {
            assert!(!tree.apply_completion(completion), "stale reply must be dropped");
        }
        assert!(tree.node(NodeId(1)).is_unloaded());
    }

    /// A payload that disagrees with the metadata point count fails the
    /// node instead of corrupting budget accounting.
    #[test]
    fn test_point_count_mismatch_fails_node() {
        let sizes = [4, 7];
        let mut tree = tree_with_children(&sizes);
        // Source believes node 1 has 3 points; metadata says 7.
        let mut dispatcher = dispatcher(&[4, 3], Vec::new(), 4);

        dispatcher.request(0, &mut tree, NodeId(1));
        for completion in dispatcher.drain_completions() {
            assert!(tree.apply_completion(completion));
        }
        assert!(tree.node(NodeId(1)).is_failed());
    }
}
