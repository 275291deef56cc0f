//! Per-frame visibility scheduling.
//!
//! One call to [`VisibilityScheduler::update_visibility`] per frame drives
//! the whole streaming pipeline: apply finished loads, walk each cloud's
//! octree in screen-space-importance order under the global point budget,
//! promote loaded nodes to renderables (bounded per frame), request loads
//! for visible-but-unloaded nodes (bounded concurrency), and evict stale
//! cached payloads.

use std::sync::Arc;

use glam::DVec3;

use pulsar_config::Config;
use pulsar_math::{Camera, Frustum};
use pulsar_octree::{LoadDispatcher, NodeId, PointSource};

use crate::cache::NodeCache;
use crate::point_cloud::PointCloud;
use crate::queue::{MAX_WEIGHT, QueueItem, TraversalQueue};
use crate::scene::SceneAdapter;

/// What one frame's visibility pass decided.
#[derive(Debug, Default)]
pub struct VisibilityResult {
    /// Promoted nodes shown this frame, as (cloud index, node) pairs, in
    /// traversal (priority) order.
    pub visible_nodes: Vec<(usize, NodeId)>,
    /// Total points accepted across all clouds.
    pub num_visible_points: u64,
    /// A loaded node could not be promoted because the per-frame cap was
    /// already spent.
    pub exceeded_promotion_cap: bool,
    /// A previously failed node was encountered during the walk.
    pub node_load_failed: bool,
    /// Loads started this frame, as (cloud index, node) pairs.
    pub loads_started: Vec<(usize, NodeId)>,
}

/// Per-cloud data computed once per frame.
struct CloudFrame {
    /// View frustum in the cloud's local space.
    frustum: Frustum,
    /// Camera position in the cloud's local space.
    local_camera: DVec3,
}

/// The frame-driving scheduler: priority walk, cache, and load dispatch.
///
/// Single-threaded by design: all traversal and cache mutation happens on
/// the caller's frame tick. Load completions arrive over a channel and are
/// applied at the start of the next tick, never concurrently.
pub struct VisibilityScheduler {
    point_budget: u64,
    loads_per_frame: usize,
    promotions_per_frame: u32,
    cache: NodeCache,
    dispatcher: LoadDispatcher,
    queue: TraversalQueue,
}

impl VisibilityScheduler {
    pub fn new(source: Arc<dyn PointSource>, config: &Config) -> Self {
        Self {
            point_budget: config.budget.point_budget,
            loads_per_frame: config.loading.loads_per_frame,
            promotions_per_frame: config.loading.promotions_per_frame,
            cache: NodeCache::new(config.budget.point_budget),
            dispatcher: LoadDispatcher::new(source, config.loading.max_concurrent_loads),
            queue: TraversalQueue::new(),
        }
    }

    pub fn point_budget(&self) -> u64 {
        self.point_budget
    }

    /// Change the point budget. Eviction is re-enforced immediately;
    /// handles of evicted renderables are released through `scene`.
    pub fn set_point_budget(
        &mut self,
        budget: u64,
        clouds: &mut [PointCloud],
        scene: &mut dyn SceneAdapter,
    ) {
        self.point_budget = budget;
        self.cache.set_budget(budget);
        let report = self.cache.enforce_budget(clouds);
        for handle in report.released_scene {
            scene.release(handle);
        }
    }

    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    /// Explicit eviction pass, callable between frames.
    pub fn free_memory(&mut self, clouds: &mut [PointCloud], scene: &mut dyn SceneAdapter) {
        let report = self.cache.free_memory(clouds);
        for handle in report.released_scene {
            scene.release(handle);
        }
    }

    /// Number of node loads currently in flight.
    pub fn in_flight_loads(&self) -> usize {
        self.dispatcher.in_flight_count()
    }

    /// Run one frame of visibility scheduling.
    ///
    /// `viewport_height` is the render target height in pixels, used for
    /// screen-space node size estimates.
    pub fn update_visibility(
        &mut self,
        clouds: &mut [PointCloud],
        camera: &Camera,
        viewport_height: f64,
        scene: &mut dyn SceneAdapter,
    ) -> VisibilityResult {
        self.apply_completed_loads(clouds);

        let mut result = VisibilityResult::default();
        let mut promotions: u32 = 0;
        // Visible-but-unloaded nodes in priority-pop order; the front of
        // this list is what the dispatcher serves first.
        let mut unloaded: Vec<(usize, NodeId)> = Vec::new();

        self.queue.clear();
        let frames = self.prepare_clouds(clouds, camera, scene);

        while let Some(item) = self.queue.pop() {
            let Some(frame) = frames[item.cloud].as_ref() else {
                continue;
            };
            let cloud = &mut clouds[item.cloud];

            let (num_points, level, bounding_box, failed) = {
                let octree = cloud.octree.as_ref().expect("queued cloud has an octree");
                let node = octree.node(item.node);
                (
                    node.num_points,
                    node.level,
                    node.bounding_box,
                    node.is_failed(),
                )
            };

            // Hard cutoff: once the next node would blow the budget, the
            // rest of the queue is abandoned for every cloud this frame.
            if result.num_visible_points + num_points > self.point_budget {
                tracing::debug!(
                    "point budget {} reached, truncating traversal",
                    self.point_budget
                );
                break;
            }
            if level > cloud.max_level {
                continue;
            }
            if !frame.frustum.intersects_aabb(&bounding_box) {
                continue;
            }
            if !cloud.clip_test(&bounding_box) {
                continue;
            }
            // A failed node blocks its whole subtree: nothing below it can
            // load, so showing or expanding it is pointless.
            if failed {
                result.node_load_failed = true;
                continue;
            }

            result.num_visible_points += num_points;
            cloud.num_visible_points += num_points;

            let octree = cloud.octree.as_mut().expect("queued cloud has an octree");
            let parent_promoted =
                item.parent.map_or(true, |parent| octree.node(parent).is_promoted());

            if !octree.node(item.node).is_promoted() && parent_promoted {
                let node = octree.node(item.node);
                if node.is_resident() && promotions < self.promotions_per_frame {
                    let parent_handle =
                        item.parent.and_then(|parent| octree.node(parent).scene_handle());
                    let handle = scene.promote(item.cloud, octree.node(item.node), parent_handle);
                    octree.node_mut(item.node).promote(handle);
                    promotions += 1;
                } else {
                    if node.is_resident() {
                        // Loaded, but this frame's promotion quota is spent.
                        result.exceeded_promotion_cap = true;
                    } else if node.is_unloaded() {
                        unloaded.push((item.cloud, item.node));
                    }
                    cloud.visible_geometry.push(item.node);
                }
            }

            let node = octree.node(item.node);
            if node.is_promoted() {
                let handle = node.scene_handle().expect("promoted node has a handle");
                scene.set_visible(handle, true);
                scene.set_bounding_box_visible(handle, cloud.show_bounding_boxes);
                self.cache.touch(item.cloud, node);
                cloud.visible_nodes.push(item.node);
                result.visible_nodes.push((item.cloud, item.node));
            }

            let children = octree.node(item.node).children;
            for child_id in children.into_iter().flatten() {
                let sphere = octree.node(child_id).bounding_sphere;
                let distance = frame.local_camera.distance(sphere.center);
                let projection_factor = camera.projection_factor(viewport_height, distance);
                let pixel_radius = sphere.radius * projection_factor;
                if pixel_radius < cloud.min_node_pixel_size {
                    continue;
                }
                let weight = if distance < sphere.radius {
                    // Camera inside the sphere: always refine.
                    MAX_WEIGHT
                } else {
                    // The 1/distance term breaks ties between nodes of
                    // equal on-screen size in favor of the nearer one.
                    pixel_radius + 1.0 / distance
                };
                self.queue.push(QueueItem {
                    cloud: item.cloud,
                    node: child_id,
                    parent: Some(item.node),
                    weight,
                });
            }
        }
        self.queue.clear();

        for &(cloud_index, node_id) in unloaded.iter().take(self.loads_per_frame) {
            if !self.dispatcher.has_capacity() {
                break;
            }
            let octree = clouds[cloud_index]
                .octree
                .as_mut()
                .expect("candidate cloud has an octree");
            if self.dispatcher.request(cloud_index, octree, node_id) {
                result.loads_started.push((cloud_index, node_id));
            }
        }

        let report = self.cache.enforce_budget(clouds);
        for handle in report.released_scene {
            scene.release(handle);
        }

        result
    }

    /// Drain the completion channel and install results on their nodes.
    /// Freshly resident payloads enter the cache immediately so the budget
    /// accounts for them even before their first promotion.
    fn apply_completed_loads(&mut self, clouds: &mut [PointCloud]) {
        for completion in self.dispatcher.drain_completions() {
            let cloud_index = completion.cloud;
            let node_id = completion.node;
            let Some(octree) = clouds
                .get_mut(cloud_index)
                .and_then(|cloud| cloud.octree.as_mut())
            else {
                tracing::debug!("dropping completion for unknown cloud {cloud_index}");
                continue;
            };
            if octree.apply_completion(completion) {
                self.cache.touch(cloud_index, octree.node(node_id));
            }
        }
    }

    /// Reset per-cloud scratch, hide last frame's renderables, compute
    /// cloud-local frustums and camera positions, and seed roots.
    fn prepare_clouds(
        &mut self,
        clouds: &mut [PointCloud],
        camera: &Camera,
        scene: &mut dyn SceneAdapter,
    ) -> Vec<Option<CloudFrame>> {
        let mut frames = Vec::with_capacity(clouds.len());
        for (index, cloud) in clouds.iter_mut().enumerate() {
            // Hide before re-deriving: only nodes the walk reaches this
            // frame become visible again.
            let previously_visible = std::mem::take(&mut cloud.visible_nodes);
            if let Some(octree) = cloud.octree.as_ref() {
                for node_id in previously_visible {
                    if let Some(handle) = octree.node(node_id).scene_handle() {
                        scene.set_visible(handle, false);
                    }
                }
            }
            cloud.reset_frame_state();

            let Some(octree) = cloud.octree.as_ref() else {
                // Metadata has not arrived yet; skip this cloud.
                frames.push(None);
                continue;
            };

            frames.push(Some(CloudFrame {
                frustum: Frustum::from_matrix(&(camera.proj * camera.view * cloud.world)),
                local_camera: cloud.world.inverse().transform_point3(camera.position),
            }));

            if cloud.visible {
                self.queue.push(QueueItem {
                    cloud: index,
                    node: octree.root_id(),
                    parent: None,
                    weight: MAX_WEIGHT,
                });
            }
        }
        frames
    }
}
