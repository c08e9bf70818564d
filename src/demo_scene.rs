// src/demo_scene.rs
//
// Content shown behind the portal: a rotating torus, the rotating
// portal-entry block and a floor slab for the interior world.

use glam::{Mat4, Quat, Vec3};

use crate::engine_lib::config::PortalConfig;
use crate::engine_lib::geometry::Pose;
use crate::rendering_lib::compositor::{CompositorContent, InteriorObject};
use crate::rendering_lib::scene_graph::{Material, MeshKind};

const TORUS_BLUE: [f32; 4] = [0.231, 0.510, 0.965, 1.0];
const ENTRY_YELLOW: [f32; 4] = [0.980, 0.800, 0.082, 1.0];
const FLOOR_GREY: [f32; 4] = [0.18, 0.16, 0.26, 1.0];

pub const PREVIEW_FOV_DEG: f32 = 60.0;
pub const PREVIEW_ZNEAR: f32 = 0.1;
pub const PREVIEW_ZFAR: f32 = 100.0;

/// Desktop viewer start: slightly above and in front of the origin, looking at it.
pub fn initial_viewer_pose() -> (Pose, f32, f32) {
    let position = Vec3::new(0.0, 0.5, 4.0);
    let yaw = 0.0;
    let pitch = -(0.5f32).atan2(4.0);
    let pose = Pose {
        position,
        orientation: Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch),
        scale: Vec3::ONE,
    };
    (pose, yaw, pitch)
}

pub fn portal_content(config: &PortalConfig) -> CompositorContent {
    // Per-frame rotations of the prototype at 60 Hz, as radians per second.
    let torus_spin = Vec3::new(0.01, 0.007, 0.0) * 60.0;
    let entry_spin = Vec3::new(0.0, 0.02, 0.0) * 60.0;

    CompositorContent {
        interior: vec![
            InteriorObject {
                name: "torus".to_string(),
                mesh: MeshKind::Torus { radius: 0.6, tube: 0.18, radial_segments: 12, tubular_segments: 24 },
                material: Material::new(TORUS_BLUE),
                base: Mat4::from_translation(Vec3::new(0.0, 1.2, -3.0)),
                spin: torus_spin,
                mirrored: true,
            },
            InteriorObject {
                name: "portal_entry".to_string(),
                mesh: MeshKind::Box { size: Vec3::new(0.8, 0.4, 0.2) },
                material: Material::emissive(ENTRY_YELLOW, 0.8),
                base: Mat4::from_translation(Vec3::new(0.0, 0.4, -1.5)),
                spin: entry_spin,
                mirrored: true,
            },
            InteriorObject {
                name: "floor".to_string(),
                mesh: MeshKind::Box { size: Vec3::new(6.0, 0.05, 6.0) },
                material: Material::new(FLOOR_GREY),
                base: Mat4::from_translation(Vec3::new(0.0, -0.025, -3.0)),
                spin: Vec3::ZERO,
                mirrored: false,
            },
        ],
        portal_size: config.portal_size,
        frame_material: Material::emissive(ENTRY_YELLOW, 0.4),
        reticle_material: Material::new([1.0, 1.0, 1.0, 0.9]),
        inner_clear_color: [0.04, 0.02, 0.10, 1.0],
        overlay_color: [0.01, 0.0, 0.03],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_sits_behind_the_portal_plane() {
        let content = portal_content(&PortalConfig::default());
        for object in &content.interior {
            let z = object.base.w_axis.z;
            assert!(z < 0.0, "{} should be behind the surface", object.name);
        }
        assert!(content.interior.iter().filter(|o| o.mirrored).count() >= 1);
    }

    #[test]
    fn viewer_starts_looking_at_origin() {
        let (pose, _, _) = initial_viewer_pose();
        let to_origin = (-pose.position).normalize();
        assert!(pose.forward().abs_diff_eq(to_origin, 1e-4));
    }
}
