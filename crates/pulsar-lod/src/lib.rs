//! LOD visibility scheduling and budgeted caching for out-of-core point
//! clouds: the per-frame priority walk that decides which octree nodes to
//! show and request, and the LRU eviction engine that keeps resident point
//! data under a global budget.

mod cache;
mod point_cloud;
mod queue;
mod scene;
mod visibility;

pub use cache::{EvictionReport, NodeCache};
pub use point_cloud::{ClipMode, PointCloud};
pub use queue::{MAX_WEIGHT, QueueItem, TraversalQueue};
pub use scene::SceneAdapter;
pub use visibility::{VisibilityResult, VisibilityScheduler};
