// src/engine_lib/camera.rs

use glam::Vec3;

use crate::engine_lib::geometry::{Pose, Ray};
use crate::rendering_lib::projection::ViewProjection;

/// Perspective parameters of the preview camera. The pose comes from the
/// controller (desktop) or the viewer pose (immersive session).
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub fov_y_rad: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(fov_y_deg: f32, znear: f32, zfar: f32) -> Self {
        Self {
            fov_y_rad: fov_y_deg.to_radians(),
            znear,
            zfar,
        }
    }

    pub fn view_projection(&self, pose: &Pose, width: f32, height: f32) -> ViewProjection {
        ViewProjection::new(pose.to_matrix(), self.fov_y_rad, self.znear, self.zfar, width, height)
    }

    /// World-space ray through pixel (`x`, `y`), origin top-left.
    pub fn pointer_ray(&self, pose: &Pose, x: f32, y: f32, width: f32, height: f32) -> Ray {
        let aspect = width / height;
        let tan_half = (self.fov_y_rad / 2.0).tan();
        let ndc_x = (x / width) * 2.0 - 1.0;
        let ndc_y = 1.0 - (y / height) * 2.0;
        let dir_cam = Vec3::new(ndc_x * tan_half * aspect, ndc_y * tan_half, -1.0);
        Ray::new(pose.position, pose.orientation * dir_cam)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn centre_ray_follows_gaze() {
        let camera = Camera::new(75.0, 0.1, 100.0);
        let pose = Pose { position: Vec3::new(0.0, 1.6, 0.0), orientation: Quat::from_rotation_y(0.4), scale: Vec3::ONE };
        let ray = camera.pointer_ray(&pose, 400.0, 300.0, 800.0, 600.0);
        assert!(ray.direction.abs_diff_eq(pose.forward(), 1e-5));
    }

    #[test]
    fn pointer_ray_reprojects_to_same_pixel() {
        let camera = Camera::new(60.0, 0.1, 100.0);
        let pose = Pose::IDENTITY;
        let ray = camera.pointer_ray(&pose, 120.0, 500.0, 800.0, 600.0);
        let view = camera.view_projection(&pose, 800.0, 600.0);
        let p = view.project(view.to_camera_space(ray.at(5.0))).unwrap();
        assert!((p.x - 120.0).abs() < 1e-2 && (p.y - 500.0).abs() < 1e-2);
    }
}
