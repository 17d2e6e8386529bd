//! Camera and lights shared by the scene and page writers.

use serde::{Deserialize, Serialize};

use super::config::Rgb;
use crate::geom::{BBox, Point3, Transform, Vec3};

/// Directional light; `direction` points from the scene towards the light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub direction: [f64; 3],
    pub color: Rgb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParameters {
    pub eye: [f64; 3],
    pub target: [f64; 3],
    pub up: [f64; 3],
    pub fov_degrees: f64,
    pub background: Rgb,
    pub lights: Vec<Light>,
}

impl Default for ViewParameters {
    fn default() -> Self {
        Self {
            eye: [0.0, 0.0, 10.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov_degrees: 45.0,
            background: Rgb::BLACK,
            lights: vec![Light { direction: [0.0, 0.5, 1.0], color: Rgb::WHITE }],
        }
    }
}

impl ViewParameters {
    /// Keeps the view direction, lights and field of view but moves the camera
    /// so the whole of `bounds` is visible.
    #[must_use]
    pub fn framed(&self, bounds: BBox) -> Self {
        let centre = bounds.center();
        let radius = (bounds.diagonal() * 0.5).max(1e-6);
        let half_fov = (self.fov_degrees.clamp(1.0, 170.0) * 0.5).to_radians();
        let distance = radius / half_fov.sin() * 1.05;
        let direction = (Point3::from_array(self.eye) - Point3::from_array(self.target))
            .normalized_or(Vec3::Z);
        Self {
            eye: (centre + direction * distance).to_array(),
            target: centre.to_array(),
            ..self.clone()
        }
    }

    /// World-to-camera transform; `None` when eye, target and up are degenerate.
    #[must_use]
    pub fn camera(&self) -> Option<Transform> {
        Transform::look_at(
            Point3::from_array(self.eye),
            Point3::from_array(self.target),
            Vec3::from_array(self.up),
        )
    }

    /// World-to-camera transform, falling back to looking down -Z from +Z.
    #[must_use]
    pub fn camera_or_default(&self) -> Transform {
        self.camera().unwrap_or_else(|| {
            log::warn!("degenerate view parameters, using the default camera");
            Transform::look_at(Point3::new(0.0, 0.0, 1.0), Point3::ORIGIN, Vec3::Y)
                .unwrap_or_default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_keeps_bounds_in_front_of_the_camera() {
        let bounds = BBox::new(Point3::new(-1.0, 0.0, -1.0), Point3::new(1.0, 10.0, 1.0));
        let view = ViewParameters::default().framed(bounds);
        let camera = view.camera().unwrap();
        for corner in bounds.corners() {
            assert!(camera.apply_point(corner).z < 0.0);
        }
        assert_eq!(view.target, [0.0, 5.0, 0.0]);
    }

    #[test]
    fn degenerate_view_falls_back() {
        let view = ViewParameters { up: [0.0, 0.0, 1.0], ..ViewParameters::default() };
        assert!(view.camera().is_none());
        let camera = view.camera_or_default();
        assert!(camera.apply_point(Point3::ORIGIN).z < 0.0);
    }
}
