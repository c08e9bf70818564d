// src/engine_lib/anchor.rs

use glam::{Mat4, Quat, Vec3};
use log::info;

use crate::engine_lib::crossing::CrossingState;
use crate::engine_lib::geometry::{facing_yaw, signed_plane_distance, yaw_forward, Pose};
use crate::engine_lib::placement::PlacementState;

/// Committed portal transform. Orientation is yaw-only so the frame stays upright.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnchorTransform {
    pub position: Vec3,
    pub yaw: f32,
}

impl AnchorTransform {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }

    /// Anchor at `reticle`, floor-clamped, facing a viewer that looks along `viewer_forward`.
    pub fn facing_viewer(reticle: &Pose, viewer_forward: Vec3) -> Self {
        let mut position = reticle.position;
        position.y = position.y.max(0.0);
        Self { position, yaw: facing_yaw(viewer_forward) }
    }

    /// Yaw-only anchor following an externally tracked pose (marker mode).
    pub fn from_tracked_pose(pose: &Pose) -> Self {
        // The pose's +Z faces the camera; take its heading only.
        let facing = pose.orientation * Vec3::Z;
        Self { position: pose.position, yaw: facing.x.atan2(facing.z) }
    }

    pub fn rotation(&self) -> Quat {
        Quat::from_rotation_y(self.yaw)
    }

    /// Local -Z rotated by the anchor yaw; points away from the placing viewer.
    pub fn forward(&self) -> Vec3 {
        yaw_forward(self.yaw)
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation(), self.position)
    }

    pub fn signed_distance(&self, viewer_position: Vec3) -> f32 {
        signed_plane_distance(viewer_position, self.position, self.forward())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CommitOutcome {
    Locked(AnchorTransform),
    Enter,
    Ignored,
}

/// Holds the single locked anchor of a session.
#[derive(Debug, Default)]
pub struct PortalAnchor {
    locked: Option<AnchorTransform>,
}

impl PortalAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locked(&self) -> Option<&AnchorTransform> {
        self.locked.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    /// Applies a select input according to the commit table.
    pub fn commit(
        &mut self,
        placement: &PlacementState,
        crossing: CrossingState,
        viewer_forward: Vec3,
    ) -> CommitOutcome {
        match (self.locked.is_some(), crossing) {
            (true, CrossingState::Inside) => CommitOutcome::Enter,
            (true, CrossingState::Outside) => CommitOutcome::Ignored,
            (false, CrossingState::Inside) => CommitOutcome::Ignored,
            (false, CrossingState::Outside) => {
                let Some(reticle) = placement.reticle_pose.filter(|_| placement.has_valid_placement) else {
                    return CommitOutcome::Ignored;
                };
                let anchor = AnchorTransform::facing_viewer(&reticle, viewer_forward);
                info!(
                    "portal locked at ({:.3}, {:.3}, {:.3}) yaw {:.3}",
                    anchor.position.x, anchor.position.y, anchor.position.z, anchor.yaw
                );
                self.locked = Some(anchor);
                CommitOutcome::Locked(anchor)
            }
        }
    }

    pub fn reset(&mut self) {
        self.locked = None;
    }
}
