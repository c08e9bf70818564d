// src/engine_lib/geometry.rs

use glam::{Mat4, Quat, Vec2, Vec3};

const RAY_PARALLEL_EPSILON: f32 = 1e-6;

/// Position, orientation and scale decomposed from a tracking-source transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: Vec3,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_matrix(transform: &Mat4) -> Self {
        let (scale, orientation, position) = transform.to_scale_rotation_translation();
        Self { position, orientation: orientation.normalize(), scale }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation, self.position)
    }

    /// The pose's local -Z axis in world space.
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }
}

impl Default for Pose {
    fn default() -> Self {
        Pose::IDENTITY
    }
}

/// Signed distance of `point` from the plane through `plane_point` with
/// normal `plane_normal`. Positive on the side the normal points to.
pub fn signed_plane_distance(point: Vec3, plane_point: Vec3, plane_normal: Vec3) -> f32 {
    (point - plane_point).dot(plane_normal)
}

/// Yaw that turns an object's local +Z towards a viewer looking along `forward`.
/// Only the horizontal components take part, so pitch and roll of the viewer
/// never tilt the result.
pub fn facing_yaw(forward: Vec3) -> f32 {
    forward.x.atan2(forward.z) + std::f32::consts::PI
}

/// Local -Z rotated about +Y by `yaw`.
pub fn yaw_forward(yaw: f32) -> Vec3 {
    Quat::from_rotation_y(yaw) * Vec3::NEG_Z
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize_or_zero() }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the plane, if the ray hits it in front of the origin.
    pub fn intersect_plane(&self, plane_point: Vec3, plane_normal: Vec3) -> Option<f32> {
        let denom = self.direction.dot(plane_normal);
        if denom.abs() < RAY_PARALLEL_EPSILON {
            return None;
        }
        let t = (plane_point - self.origin).dot(plane_normal) / denom;
        (t >= 0.0).then_some(t)
    }

    /// Intersects a rectangle lying in the local XY plane of `transform`
    /// and centred on its origin. Returns the hit distance.
    pub fn intersect_rect(&self, transform: &Mat4, half_extents: Vec2) -> Option<f32> {
        let center = transform.transform_point3(Vec3::ZERO);
        let normal = transform.transform_vector3(Vec3::Z).normalize_or_zero();
        let t = self.intersect_plane(center, normal)?;
        let local = transform.inverse().transform_point3(self.at(t));
        if local.x.abs() <= half_extents.x && local.y.abs() <= half_extents.y {
            Some(t)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const EPS: f32 = 1e-5;

    fn angle_eq(a: f32, b: f32) -> bool {
        let d = (a - b).rem_euclid(2.0 * PI);
        d < 1e-4 || (2.0 * PI - d) < 1e-4
    }

    #[test]
    fn pose_decomposes_translation_rotation_scale() {
        let rot = Quat::from_rotation_y(0.7) * Quat::from_rotation_x(-0.3);
        let m = Mat4::from_scale_rotation_translation(Vec3::splat(1.0), rot, Vec3::new(1.0, 2.0, -3.0));
        let pose = Pose::from_matrix(&m);
        assert!(pose.position.abs_diff_eq(Vec3::new(1.0, 2.0, -3.0), EPS));
        assert!(pose.scale.abs_diff_eq(Vec3::ONE, EPS));
        assert!(pose.orientation.abs_diff_eq(rot, EPS) || pose.orientation.abs_diff_eq(-rot, EPS));
        assert!(pose.to_matrix().abs_diff_eq(m, EPS));
    }

    #[test]
    fn signed_distance_sign_follows_normal() {
        let d = signed_plane_distance(Vec3::new(0.0, 5.0, 2.0), Vec3::ZERO, Vec3::Z);
        assert!((d - 2.0).abs() < EPS);
        let d = signed_plane_distance(Vec3::new(0.0, 0.0, -0.5), Vec3::ZERO, Vec3::Z);
        assert!((d + 0.5).abs() < EPS);
    }

    #[test]
    fn facing_yaw_ignores_pitch_and_roll() {
        for &heading in &[0.0, FRAC_PI_4, FRAC_PI_2, 2.5, -1.2] {
            for &pitch in &[-1.2, -0.4, 0.0, 0.6, 1.3] {
                for &roll in &[-0.8, 0.0, 0.9] {
                    let orientation = Quat::from_rotation_y(heading)
                        * Quat::from_rotation_x(pitch)
                        * Quat::from_rotation_z(roll);
                    let forward = orientation * Vec3::NEG_Z;
                    let expected = forward.x.atan2(forward.z) + PI;
                    assert!(angle_eq(facing_yaw(forward), expected));
                    // heading alone decides the result
                    let flat = Quat::from_rotation_y(heading) * Vec3::NEG_Z;
                    assert!(angle_eq(facing_yaw(forward), facing_yaw(flat)));
                }
            }
        }
    }

    #[test]
    fn yaw_forward_matches_viewer_heading() {
        let viewer_forward = Vec3::new(1.0, -0.4, -1.0).normalize();
        let fwd = yaw_forward(facing_yaw(viewer_forward));
        let flat = Vec3::new(viewer_forward.x, 0.0, viewer_forward.z).normalize();
        assert!(fwd.abs_diff_eq(flat, 1e-4));
    }

    #[test]
    fn ray_hits_rect_inside_extents_only() {
        let rect = Mat4::from_translation(Vec3::new(0.0, 1.0, -3.0));
        let half = Vec2::new(0.5, 1.0);
        let hit = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::NEG_Z).intersect_rect(&rect, half);
        assert!((hit.unwrap() - 3.0).abs() < EPS);
        let miss = Ray::new(Vec3::new(2.0, 1.0, 0.0), Vec3::NEG_Z).intersect_rect(&rect, half);
        assert!(miss.is_none());
        let behind = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z).intersect_rect(&rect, half);
        assert!(behind.is_none());
    }
}
