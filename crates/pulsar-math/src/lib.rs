//! Double-precision spatial primitives for point cloud streaming: bounding
//! volumes, view frustums, and camera projection math.

mod aabb;
mod camera;
mod frustum;
mod sphere;

pub use aabb::Aabb;
pub use camera::{Camera, Projection};
pub use frustum::{Frustum, Plane};
pub use sphere::BoundingSphere;
