// src/engine_lib/config.rs

use glam::{Vec2, Vec3};

pub const ENTER_THRESHOLD: f32 = 0.25;
pub const EXIT_THRESHOLD: f32 = -0.1;
pub const SMOOTHING_FACTOR: f32 = 0.08;
pub const INSIDE_OCCLUSION_OPACITY: f32 = 0.98;
pub const INSIDE_CLEAR_ALPHA: f32 = 1.0;
pub const OPAQUE_SNAP_THRESHOLD: f32 = 0.95;
pub const HIDDEN_SNAP_THRESHOLD: f32 = 0.01;

/// How the transition animator turns the smoothing factor into a per-step blend.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SmoothingMode {
    /// `factor` applied once per rendered frame regardless of frame time.
    PerFrame,
    /// `factor` is the blend for one frame at `reference_hz`; other frame
    /// times are rescaled as `1 - (1 - factor)^(dt * reference_hz)`.
    TimeScaled { reference_hz: f32 },
}

/// Optional session capabilities requested alongside the mandatory hit-test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionFeatures {
    pub dom_overlay: bool,
    pub local_floor: bool,
}

impl Default for SessionFeatures {
    fn default() -> Self {
        Self { dom_overlay: true, local_floor: true }
    }
}

#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub enter_threshold: f32,
    pub exit_threshold: f32,
    pub smoothing_factor: f32,
    pub smoothing_mode: SmoothingMode,
    pub inside_occlusion_opacity: f32,
    pub inside_clear_alpha: f32,
    pub opaque_snap_threshold: f32,
    pub hidden_snap_threshold: f32,
    /// Width and height of the portal surface in metres.
    pub portal_size: Vec2,
    /// Anchor used when neither hit-testing nor the marker detector is available.
    pub default_anchor_position: Vec3,
    pub default_anchor_yaw: f32,
    pub session_features: SessionFeatures,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            enter_threshold: ENTER_THRESHOLD,
            exit_threshold: EXIT_THRESHOLD,
            smoothing_factor: SMOOTHING_FACTOR,
            smoothing_mode: SmoothingMode::PerFrame,
            inside_occlusion_opacity: INSIDE_OCCLUSION_OPACITY,
            inside_clear_alpha: INSIDE_CLEAR_ALPHA,
            opaque_snap_threshold: OPAQUE_SNAP_THRESHOLD,
            hidden_snap_threshold: HIDDEN_SNAP_THRESHOLD,
            portal_size: Vec2::new(1.0, 2.0),
            default_anchor_position: Vec3::new(0.0, -0.2, -3.0),
            default_anchor_yaw: 0.0,
            session_features: SessionFeatures::default(),
        }
    }
}
