use glam::{DMat4, DVec3};

/// Projection parameters needed for screen-space size estimates.
#[derive(Clone, Copy, Debug)]
pub enum Projection {
    Perspective {
        /// Full vertical field of view in radians.
        fov_y: f64,
    },
    Orthographic {
        /// Top of the view volume in camera space.
        top: f64,
        /// Bottom of the view volume in camera space.
        bottom: f64,
    },
}

/// Camera state consumed by the visibility walk.
///
/// `view` is the world-to-camera transform (the inverse of the camera's
/// world matrix); `position` is the camera origin in world space.
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: DVec3,
    pub view: DMat4,
    pub proj: DMat4,
    pub projection: Projection,
}

impl Camera {
    /// Build a perspective camera looking from `position` toward `target`.
    pub fn perspective(
        position: DVec3,
        target: DVec3,
        up: DVec3,
        fov_y: f64,
        aspect: f64,
        near: f64,
        far: f64,
    ) -> Self {
        Self {
            position,
            view: DMat4::look_at_rh(position, target, up),
            proj: DMat4::perspective_rh(fov_y, aspect, near, far),
            projection: Projection::Perspective { fov_y },
        }
    }

    /// Build an orthographic camera looking from `position` toward `target`.
    #[allow(clippy::too_many_arguments)]
    pub fn orthographic(
        position: DVec3,
        target: DVec3,
        up: DVec3,
        left: f64,
        right: f64,
        bottom: f64,
        top: f64,
        near: f64,
        far: f64,
    ) -> Self {
        Self {
            position,
            view: DMat4::look_at_rh(position, target, up),
            proj: DMat4::orthographic_rh(left, right, bottom, top, near, far),
            projection: Projection::Orthographic { top, bottom },
        }
    }

    /// Combined projection * view matrix.
    pub fn view_proj(&self) -> DMat4 {
        self.proj * self.view
    }

    /// Pixels per local-space unit at the given camera distance.
    ///
    /// Multiplying an object's radius by this factor gives its projected
    /// radius on screen in pixels. Perspective shrinks with distance;
    /// orthographic is distance-independent.
    pub fn projection_factor(&self, viewport_height: f64, distance: f64) -> f64 {
        match self.projection {
            Projection::Perspective { fov_y } => {
                let slope = (fov_y * 0.5).tan();
                (0.5 * viewport_height) / (slope * distance)
            }
            Projection::Orthographic { top, bottom } => viewport_height / (top - bottom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// With fov 90 the projection factor at distance d is halfHeight / d.
    #[test]
    fn test_perspective_projection_factor() {
        let cam = Camera::perspective(
            DVec3::ZERO,
            DVec3::NEG_Z,
            DVec3::Y,
            std::f64::consts::FRAC_PI_2,
            1.0,
            0.1,
            100.0,
        );
        let factor = cam.projection_factor(1000.0, 10.0);
        assert!((factor - 50.0).abs() < 1e-9, "got {factor}");
    }

    /// Perspective factor halves when the distance doubles.
    #[test]
    fn test_perspective_factor_scales_inverse_with_distance() {
        let cam = Camera::perspective(
            DVec3::ZERO,
            DVec3::NEG_Z,
            DVec3::Y,
            1.0,
            1.0,
            0.1,
            100.0,
        );
        let near = cam.projection_factor(720.0, 5.0);
        let far = cam.projection_factor(720.0, 10.0);
        assert!((near / far - 2.0).abs() < 1e-9);
    }

    /// Orthographic factor ignores distance entirely.
    #[test]
    fn test_orthographic_factor_is_distance_independent() {
        let cam = Camera::orthographic(
            DVec3::ZERO,
            DVec3::NEG_Z,
            DVec3::Y,
            -10.0,
            10.0,
            -5.0,
            5.0,
            0.1,
            100.0,
        );
        let a = cam.projection_factor(1000.0, 1.0);
        let b = cam.projection_factor(1000.0, 500.0);
        assert_eq!(a, b);
        // 1000 pixels span 10 units of view volume: 100 px per unit.
        assert!((a - 100.0).abs() < 1e-9);
    }
}
